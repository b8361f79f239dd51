//! Screen-space quad geometry for a given scaling mode.
//!
//! The quad is described by normalised half-extents `(hx, hy)`: the image is
//! drawn as the clip-space rectangle `(-hx, -hy)..(hx, hy)` with texture
//! coordinates covering the full image, V flipped so the first pixel row
//! lands at the top of the screen.

use crate::types::ScaleMode;

/// One interleaved vertex: clip-space position then texture coordinate.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct QuadVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

/// Computes the half-extents for drawing a `texture`-sized image on a
/// `screen`-sized target.
///
/// `center` never exceeds the screen (letter/pillar-boxing, no crop); the
/// `fit-*` modes pin one axis at 1.0 and let the other follow the image
/// aspect, cropping via clip space when it exceeds the screen.
pub fn half_extents(mode: ScaleMode, screen: (u32, u32), texture: (u32, u32)) -> (f32, f32) {
    let (sw, sh) = (screen.0 as f32, screen.1 as f32);
    let (tw, th) = (texture.0 as f32, texture.1 as f32);
    debug_assert!(sw > 0.0 && sh > 0.0 && tw > 0.0 && th > 0.0);

    let screen_aspect = sw / sh;
    let texture_aspect = tw / th;

    match mode {
        ScaleMode::Stretch => (1.0, 1.0),
        ScaleMode::FitHorizontal => (1.0, (th / tw) * (sw / sh)),
        ScaleMode::FitVertical => ((tw / th) * (sh / sw), 1.0),
        ScaleMode::Center => {
            let (hx, hy) = if texture_aspect > screen_aspect {
                (1.0, screen_aspect / texture_aspect)
            } else {
                (texture_aspect / screen_aspect, 1.0)
            };
            (hx.min(1.0), hy.min(1.0))
        }
    }
}

/// Emits the two triangles covering `(-hx,-hy)..(hx,hy)`, V flipped to match
/// the top-left origin of the source pixels.
pub(crate) fn quad_vertices(hx: f32, hy: f32) -> [QuadVertex; 6] {
    let (x1, y1, x2, y2) = (-hx, -hy, hx, hy);
    let (u1, v1, u2, v2) = (0.0, 1.0, 1.0, 0.0);

    [
        QuadVertex {
            position: [x1, y1],
            uv: [u1, v1],
        },
        QuadVertex {
            position: [x2, y1],
            uv: [u2, v1],
        },
        QuadVertex {
            position: [x1, y2],
            uv: [u1, v2],
        },
        QuadVertex {
            position: [x2, y1],
            uv: [u2, v1],
        },
        QuadVertex {
            position: [x2, y2],
            uv: [u2, v2],
        },
        QuadVertex {
            position: [x1, y2],
            uv: [u1, v2],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn stretch_fills_the_screen() {
        let (hx, hy) = half_extents(ScaleMode::Stretch, (1920, 1080), (100, 100));
        assert!(close(hx, 1.0) && close(hy, 1.0));
    }

    #[test]
    fn fit_vertical_pins_height() {
        let (hx, hy) = half_extents(ScaleMode::FitVertical, (1920, 1080), (1000, 1000));
        assert!(close(hy, 1.0));
        assert!(close(hx, 0.5625));
    }

    #[test]
    fn fit_horizontal_pins_width() {
        let (hx, hy) = half_extents(ScaleMode::FitHorizontal, (1920, 1080), (1920, 960));
        assert!(close(hx, 1.0));
        assert!(close(hy, (960.0 / 1920.0) * (1920.0 / 1080.0)));
    }

    #[test]
    fn center_pillar_boxes_portrait_source() {
        let (hx, hy) = half_extents(ScaleMode::Center, (1920, 1080), (1080, 1920));
        assert!(close(hy, 1.0));
        assert!(close(hx, 0.31640625));
    }

    #[test]
    fn center_letter_boxes_wide_source() {
        let (hx, hy) = half_extents(ScaleMode::Center, (1920, 1080), (2000, 500));
        assert!(close(hx, 1.0));
        assert!(hy < 1.0 && hy > 0.0);
    }

    #[test]
    fn center_never_exceeds_the_screen() {
        for (sw, sh) in [(1920u32, 1080u32), (1080, 1920), (2560, 1440), (800, 600)] {
            for (tw, th) in [(1u32, 1u32), (4000, 100), (100, 4000), (1920, 1080)] {
                let (hx, hy) = half_extents(ScaleMode::Center, (sw, sh), (tw, th));
                assert!(hx > 0.0 && hx <= 1.0, "hx={hx} for {sw}x{sh} {tw}x{th}");
                assert!(hy > 0.0 && hy <= 1.0, "hy={hy} for {sw}x{sh} {tw}x{th}");
            }
        }
    }

    #[test]
    fn fit_modes_pin_exactly_one_axis() {
        for (tw, th) in [(1000u32, 1000u32), (2500, 900), (700, 1600)] {
            let (hx, hy) = half_extents(ScaleMode::FitHorizontal, (1920, 1080), (tw, th));
            assert!(close(hx, 1.0));
            assert!(hy > 0.0);
            let (hx, hy) = half_extents(ScaleMode::FitVertical, (1920, 1080), (tw, th));
            assert!(close(hy, 1.0));
            assert!(hx > 0.0);
        }
    }

    #[test]
    fn quad_covers_full_texture_with_v_flip() {
        let verts = quad_vertices(0.5, 1.0);
        assert_eq!(std::mem::size_of::<QuadVertex>(), 16);
        // Top-left corner of the screen shows the first pixel row (v = 0).
        let top_left = verts
            .iter()
            .find(|v| v.position == [-0.5, 1.0])
            .expect("top-left vertex");
        assert_eq!(top_left.uv, [0.0, 0.0]);
        let bottom_right = verts
            .iter()
            .find(|v| v.position == [0.5, -1.0])
            .expect("bottom-right vertex");
        assert_eq!(bottom_right.uv, [1.0, 1.0]);
    }
}
