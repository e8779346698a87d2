//! # Liveness registry - running loops by name.
//!
//! The registry maps loop names to their [`SupervisedLoop`] while they run. It is
//! the only state shared between loops and is owned by the
//! [`Supervisor`](crate::Supervisor), which hands it to every loop it builds.
//!
//! ## Rules
//! - Entries are added only by `SupervisedLoop::start` and removed by
//!   `SupervisedLoop::stop` or by the exit guard of a faulted loop; outside the
//!   crate the registry is read-only
//! - `put` is the only place where name uniqueness is enforced
//! - `for_each` visits a snapshot: the lock is held only to clone the entries,
//!   never while visiting, so a sweep never blocks start/stop
//! - Removal by the owning loop uses `remove_if`, which compares instances, so a
//!   stale removal can never evict another loop registered under the same name

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::core::supervised::SupervisedLoop;
use crate::error::LoopError;

/// Concurrent-safe name → loop mapping.
///
/// Obtained from [`Supervisor::registry`](crate::Supervisor::registry).
///
/// Read-only for callers: only loops insert or remove themselves.
/// ```compile_fail
/// use std::sync::Arc;
/// use loopvisor::{Config, NoopTask, Supervisor};
///
/// # async fn evict() {
/// let sup = Supervisor::builder(Config::default()).build();
/// let lp = sup.loop_builder("poller", Arc::new(NoopTask)).build();
/// let _ = sup.registry().put("poller", lp);
/// # }
/// ```
pub struct Registry {
    loops: RwLock<HashMap<String, Arc<SupervisedLoop>>>,
}

impl Registry {
    /// Creates an empty registry.
    pub(crate) fn new() -> Self {
        Self {
            loops: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts `lp` under `name`.
    ///
    /// Fails with [`LoopError::DuplicateName`] if the name is taken; the existing
    /// entry is left untouched.
    pub(crate) fn put(&self, name: &str, lp: Arc<SupervisedLoop>) -> Result<(), LoopError> {
        let mut loops = self.loops.write().unwrap_or_else(PoisonError::into_inner);
        if loops.contains_key(name) {
            return Err(LoopError::DuplicateName {
                name: name.to_string(),
            });
        }
        loops.insert(name.to_string(), lp);
        Ok(())
    }

    /// Removes the entry for `name` only if it is `lp`. Returns true if removed.
    pub(crate) fn remove_if(&self, name: &str, lp: &SupervisedLoop) -> bool {
        let mut loops = self.loops.write().unwrap_or_else(PoisonError::into_inner);
        match loops.get(name) {
            Some(entry) if std::ptr::eq(Arc::as_ptr(entry), lp) => {
                loops.remove(name);
                true
            }
            _ => false,
        }
    }

    /// Returns the loop registered under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<SupervisedLoop>> {
        self.loops
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// True if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.loops
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Clones the current entries, sorted by name.
    pub fn snapshot(&self) -> Vec<Arc<SupervisedLoop>> {
        let mut entries: Vec<(String, Arc<SupervisedLoop>)> = {
            let loops = self.loops.read().unwrap_or_else(PoisonError::into_inner);
            loops
                .iter()
                .map(|(name, lp)| (name.clone(), Arc::clone(lp)))
                .collect()
        };
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        entries.into_iter().map(|(_, lp)| lp).collect()
    }

    /// Calls `visitor` for every entry of a snapshot taken at call time.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&str, &Arc<SupervisedLoop>),
    {
        for lp in self.snapshot() {
            visitor(lp.name(), &lp);
        }
    }

    /// Returns sorted list of registered names.
    pub fn names(&self) -> Vec<String> {
        let loops = self.loops.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = loops.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Number of registered loops.
    pub fn len(&self) -> usize {
        self.loops
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True if no loop is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reserves `name` for `lp`; the entry is removed again unless the
    /// reservation is committed.
    pub(crate) fn reserve<'a>(
        &'a self,
        name: &'a str,
        lp: &'a Arc<SupervisedLoop>,
    ) -> Result<Reservation<'a>, LoopError> {
        self.put(name, Arc::clone(lp))?;
        Ok(Reservation {
            registry: self,
            name,
            lp,
            committed: false,
        })
    }
}

/// Registry entry that is rolled back on drop unless committed.
pub(crate) struct Reservation<'a> {
    registry: &'a Registry,
    name: &'a str,
    lp: &'a Arc<SupervisedLoop>,
    committed: bool,
}

impl Reservation<'_> {
    pub(crate) fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.registry.remove_if(self.name, self.lp);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::tasks::NoopTask;
    use crate::{Config, Supervisor};

    fn build(sup: &Supervisor, name: &str) -> Arc<SupervisedLoop> {
        sup.loop_builder(name, Arc::new(NoopTask))
            .interval(Duration::from_secs(1))
            .build()
    }

    #[tokio::test]
    async fn put_rejects_duplicates_and_keeps_first() {
        let sup = Supervisor::builder(Config::default()).build();
        let reg = Registry::new();
        let first = build(&sup, "a");
        let second = build(&sup, "a");

        reg.put("a", Arc::clone(&first)).unwrap();
        let err = reg.put("a", Arc::clone(&second)).unwrap_err();
        assert!(matches!(err, LoopError::DuplicateName { ref name } if name == "a"));
        assert!(Arc::ptr_eq(&reg.get("a").unwrap(), &first));
    }

    #[tokio::test]
    async fn remove_if_only_removes_same_instance() {
        let sup = Supervisor::builder(Config::default()).build();
        let reg = Registry::new();
        let first = build(&sup, "a");
        let other = build(&sup, "a");

        reg.put("a", Arc::clone(&first)).unwrap();
        assert!(!reg.remove_if("a", &other));
        assert!(reg.contains("a"));
        assert!(reg.remove_if("a", &first));
        assert!(reg.is_empty());
    }

    #[tokio::test]
    async fn snapshot_is_sorted_and_detached() {
        let sup = Supervisor::builder(Config::default()).build();
        let reg = Registry::new();
        for name in ["c", "a", "b"] {
            reg.put(name, build(&sup, name)).unwrap();
        }

        let mut visited = Vec::new();
        reg.for_each(|name, lp| {
            // Mutating while visiting must not deadlock.
            assert!(reg.remove_if(name, lp));
            visited.push(name.to_string());
        });
        assert_eq!(visited, vec!["a", "b", "c"]);
        assert!(reg.is_empty());
    }

    #[tokio::test]
    async fn uncommitted_reservation_rolls_back() {
        let sup = Supervisor::builder(Config::default()).build();
        let reg = Registry::new();
        let lp = build(&sup, "r");
        {
            let _res = reg.reserve("r", &lp).unwrap();
            assert!(reg.contains("r"));
        }
        assert!(!reg.contains("r"));

        reg.reserve("r", &lp).unwrap().commit();
        assert_eq!(reg.names(), vec!["r".to_string()]);
    }
}
