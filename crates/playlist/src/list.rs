use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("wallpaper list may not be empty")]
pub struct EmptyListError;

struct ListState {
    paths: Vec<PathBuf>,
    current: Option<PathBuf>,
}

/// The ordered, rotating wallpaper list.
///
/// Advancing moves the head to the tail and makes it the current wallpaper,
/// so any positive number of advances is a cyclic permutation. All access
/// goes through one mutex held only across O(1)-ish operations; the list is
/// never empty once constructed.
pub struct WallpaperList {
    state: Mutex<ListState>,
}

impl WallpaperList {
    pub fn new(paths: Vec<PathBuf>) -> Result<Self, EmptyListError> {
        if paths.is_empty() {
            return Err(EmptyListError);
        }
        Ok(Self {
            state: Mutex::new(ListState {
                paths,
                current: None,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, ListState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Rotates the head to the tail and returns it as the new current
    /// wallpaper.
    pub fn advance(&self) -> PathBuf {
        let mut state = self.lock();
        let next = state.paths.remove(0);
        state.paths.push(next.clone());
        state.current = Some(next.clone());
        next
    }

    /// Replaces the whole list; an empty replacement is rejected and the
    /// running list is untouched.
    pub fn replace(&self, paths: Vec<PathBuf>) -> Result<usize, EmptyListError> {
        if paths.is_empty() {
            return Err(EmptyListError);
        }
        let count = paths.len();
        let mut state = self.lock();
        state.paths = paths;
        Ok(count)
    }

    pub fn shuffle(&self, rng: &mut impl Rng) {
        self.lock().paths.shuffle(rng);
    }

    pub fn current(&self) -> Option<PathBuf> {
        self.lock().current.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Multiset equality helper for rotation invariants.
    pub fn contents(&self) -> Vec<PathBuf> {
        self.lock().paths.clone()
    }

    /// True when both lists hold the same paths, ignoring order.
    pub fn same_multiset(&self, other: &[PathBuf]) -> bool {
        let mut ours = self.contents();
        let mut theirs = other.to_vec();
        ours.sort();
        theirs.sort();
        ours == theirs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn advancing_rotates_head_to_tail() {
        let list = WallpaperList::new(paths(&["a", "b", "c"])).unwrap();
        assert_eq!(list.advance(), PathBuf::from("a"));
        assert_eq!(list.advance(), PathBuf::from("b"));
        assert_eq!(list.advance(), PathBuf::from("c"));
        assert_eq!(list.advance(), PathBuf::from("a"));
        assert_eq!(list.current(), Some(PathBuf::from("a")));
    }

    #[test]
    fn rotation_preserves_the_multiset() {
        let original = paths(&["a", "b", "c", "d"]);
        let list = WallpaperList::new(original.clone()).unwrap();
        for _ in 0..7 {
            list.advance();
        }
        assert!(list.same_multiset(&original));
        assert_eq!(list.len(), 4);
    }

    #[test]
    fn full_cycle_is_the_identity_permutation() {
        let original = paths(&["a", "b", "c"]);
        let list = WallpaperList::new(original.clone()).unwrap();
        for _ in 0..original.len() {
            list.advance();
        }
        assert_eq!(list.contents(), original);
    }

    #[test]
    fn empty_list_is_rejected() {
        assert!(WallpaperList::new(Vec::new()).is_err());
    }

    #[test]
    fn empty_replacement_leaves_the_list_running() {
        let list = WallpaperList::new(paths(&["a", "b"])).unwrap();
        list.advance();
        assert_eq!(list.replace(Vec::new()), Err(EmptyListError));
        assert_eq!(list.len(), 2);
        assert_eq!(list.current(), Some(PathBuf::from("a")));
    }

    #[test]
    fn shuffle_keeps_every_path() {
        let original = paths(&["a", "b", "c", "d", "e"]);
        let list = WallpaperList::new(original.clone()).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        list.shuffle(&mut rng);
        assert!(list.same_multiset(&original));
    }
}
