use persistent_merkle_tree::{LeakCheck, NodePool};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

thread_local! {
    static THREAD_POOL: PoolHandle = PoolHandle::new();
}

/// A shared handle to a node pool.
///
/// Handles are `Rc`-based and therefore pinned to one thread, matching the
/// pool's unguarded hash caches. Collections created without an explicit
/// pool use [`PoolHandle::thread_default`], so all states on a thread share
/// one arena and structural sharing spans state clones.
#[derive(Clone)]
pub struct PoolHandle {
    pool: Rc<RefCell<NodePool>>,
}

impl PoolHandle {
    /// A fresh pool with leak checking off.
    pub fn new() -> Self {
        Self::with_leak_check(LeakCheck::Off)
    }

    pub fn with_leak_check(check: LeakCheck) -> Self {
        Self {
            pool: Rc::new(RefCell::new(NodePool::with_leak_check(check))),
        }
    }

    /// The pool shared by every collection on this thread that was not given
    /// an explicit pool.
    pub fn thread_default() -> Self {
        THREAD_POOL.with(Clone::clone)
    }

    pub fn borrow(&self) -> Ref<'_, NodePool> {
        self.pool.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, NodePool> {
        self.pool.borrow_mut()
    }

    /// Whether two handles address the same arena (and may therefore share
    /// nodes).
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.pool, &other.pool)
    }
}

impl Default for PoolHandle {
    fn default() -> Self {
        Self::thread_default()
    }
}

impl fmt::Debug for PoolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PoolHandle({} live nodes)", self.borrow().live_node_count())
    }
}
