//! Bookkeeping arena for compiler objects with cyclic references.
//!
//! AST nodes, types and symbols refer to each other freely, so no single
//! neighbour can own them. Instead every traceable object is handed to a
//! [`Bookkeeper`] at allocation time and stays there until
//! [`Bookkeeper::release_all`] destroys everything at once. Edges between
//! objects are [`TraceId`]s, resolved through [`Bookkeeper::get`].

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::{Mutex, PoisonError};

/// Marker for object kinds the arena may own.
pub trait Traceable: Any + Send + Sync {}

type Erased = dyn Any + Send + Sync;

struct Kind {
    name: &'static str,
    objects: Vec<NonNull<Erased>>,
}

#[derive(Default)]
struct Registry {
    kinds: HashMap<TypeId, Kind>,
    /// Kinds in first-registration order.
    order: Vec<TypeId>,
}

// SAFETY: every pointer comes from `Box::leak` of a `Send + Sync` value and
// is owned solely by the registry until `release_all` frees it.
unsafe impl Send for Registry {}

/// Non-owning, copyable reference to an object held by a [`Bookkeeper`].
pub struct TraceId<T> {
    index: usize,
    epoch: u64,
    _kind: PhantomData<fn() -> T>,
}

impl<T> Clone for TraceId<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TraceId<T> {}

impl<T> PartialEq for TraceId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.epoch == other.epoch
    }
}

impl<T> Eq for TraceId<T> {}

impl<T> Hash for TraceId<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.epoch.hash(state);
    }
}

impl<T> fmt::Debug for TraceId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TraceId<{}>({}@{})", type_name::<T>(), self.index, self.epoch)
    }
}

/// A freshly registered object: derefs to it and carries its [`TraceId`].
pub struct Traced<'a, T> {
    object: &'a T,
    id: TraceId<T>,
}

impl<'a, T> Traced<'a, T> {
    pub fn id(&self) -> TraceId<T> {
        self.id
    }

    /// The object, borrowed for as long as the arena.
    pub fn get(&self) -> &'a T {
        self.object
    }
}

impl<T> Deref for Traced<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.object
    }
}

impl<T: fmt::Debug> fmt::Debug for Traced<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Traced")
            .field("id", &self.id)
            .field("object", self.object)
            .finish()
    }
}

/// Type-partitioned owner of traceable objects.
#[derive(Default)]
pub struct Bookkeeper {
    registry: Mutex<Registry>,
    epoch: u64,
}

impl fmt::Debug for Bookkeeper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bookkeeper")
            .field("kinds", &self.kinds())
            .field("total", &self.total())
            .field("epoch", &self.epoch)
            .finish()
    }
}

impl Bookkeeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `object` and return a reference to it.
    pub fn register<T: Traceable>(&self, object: Box<T>) -> Traced<'_, T> {
        let ptr = NonNull::from(Box::leak(object));
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        let Registry { kinds, order } = &mut *registry;
        let kind = kinds.entry(TypeId::of::<T>()).or_insert_with(|| {
            order.push(TypeId::of::<T>());
            Kind {
                name: type_name::<T>(),
                objects: Vec::new(),
            }
        });
        kind.objects.push(ptr);
        let id = TraceId {
            index: kind.objects.len() - 1,
            epoch: self.epoch,
            _kind: PhantomData,
        };
        // SAFETY: the object stays allocated until `release_all`, which
        // needs `&mut self` and so cannot run while this borrow is alive.
        let object = unsafe { ptr.as_ref() };
        Traced { object, id }
    }

    /// Box `value` and register it.
    pub fn alloc<T: Traceable>(&self, value: T) -> Traced<'_, T> {
        self.register(Box::new(value))
    }

    /// Resolve an id; `None` once its objects have been released.
    pub fn get<T: Traceable>(&self, id: TraceId<T>) -> Option<&T> {
        if id.epoch != self.epoch {
            return None;
        }
        let registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        let ptr = *registry.kinds.get(&TypeId::of::<T>())?.objects.get(id.index)?;
        // SAFETY: as in `register`; the pointee lives until `release_all`.
        let object: &Erased = unsafe { ptr.as_ref() };
        object.downcast_ref::<T>()
    }

    /// Number of live objects of kind `T`.
    pub fn len<T: Traceable>(&self) -> usize {
        let registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        registry
            .kinds
            .get(&TypeId::of::<T>())
            .map_or(0, |k| k.objects.len())
    }

    /// Number of live objects of every kind.
    pub fn total(&self) -> usize {
        let registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        registry.kinds.values().map(|k| k.objects.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Type names of the registered kinds, first-registered first.
    pub fn kinds(&self) -> Vec<&'static str> {
        let registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        registry
            .order
            .iter()
            .filter_map(|id| registry.kinds.get(id))
            .map(|k| k.name)
            .collect()
    }

    /// Destroy every registered object exactly once and clear the registry.
    ///
    /// Kinds are released in first-registration order, objects of a kind in
    /// registration order. Returns the number of objects destroyed; a second
    /// call returns 0.
    pub fn release_all(&mut self) -> usize {
        let registry = std::mem::take(
            self.registry
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner),
        );
        let Registry { mut kinds, order } = registry;
        let mut released = 0;
        for type_id in order {
            let Some(kind) = kinds.remove(&type_id) else {
                continue;
            };
            log::debug!("releasing {} {}", kind.objects.len(), kind.name);
            for ptr in kind.objects {
                // SAFETY: each pointer was leaked from a `Box` exactly once in
                // `register` and is removed from the registry here, so it is
                // freed exactly once. `&mut self` rules out live borrows.
                drop(unsafe { Box::from_raw(ptr.as_ptr()) });
                released += 1;
            }
        }
        if released > 0 {
            self.epoch += 1;
        }
        released
    }
}

impl Drop for Bookkeeper {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counted {
        drops: Arc<AtomicUsize>,
    }

    impl Drop for Counted {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct NodeA(Counted);
    struct NodeB(Counted);
    impl Traceable for NodeA {}
    impl Traceable for NodeB {}

    struct Cyclic {
        name: &'static str,
        next: Mutex<Option<TraceId<Cyclic>>>,
    }
    impl Traceable for Cyclic {}

    fn counted(drops: &Arc<AtomicUsize>) -> Counted {
        Counted {
            drops: Arc::clone(drops),
        }
    }

    #[test]
    fn release_all_destroys_each_object_once() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mut arena = Bookkeeper::new();
        for _ in 0..5 {
            arena.alloc(NodeA(counted(&drops)));
        }
        for _ in 0..3 {
            arena.register(Box::new(NodeB(counted(&drops))));
        }
        assert_eq!(arena.len::<NodeA>(), 5);
        assert_eq!(arena.len::<NodeB>(), 3);
        assert_eq!(arena.total(), 8);

        assert_eq!(arena.release_all(), 8);
        assert_eq!(drops.load(Ordering::SeqCst), 8);
        assert_eq!(arena.release_all(), 0);
        assert_eq!(drops.load(Ordering::SeqCst), 8);
        assert!(arena.is_empty());
    }

    #[test]
    fn drop_releases_remaining_objects() {
        let drops = Arc::new(AtomicUsize::new(0));
        {
            let arena = Bookkeeper::new();
            arena.alloc(NodeA(counted(&drops)));
            arena.alloc(NodeB(counted(&drops)));
        }
        assert_eq!(drops.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn cycles_through_ids() {
        let mut arena = Bookkeeper::new();
        let a = arena.alloc(Cyclic {
            name: "a",
            next: Mutex::new(None),
        });
        let b = arena.alloc(Cyclic {
            name: "b",
            next: Mutex::new(Some(a.id())),
        });
        *a.next.lock().unwrap() = Some(b.id());

        let (a_id, b_id) = (a.id(), b.id());
        let next_of_a = arena.get(a_id).unwrap().next.lock().unwrap().unwrap();
        assert_eq!(arena.get(next_of_a).unwrap().name, "b");
        let next_of_b = arena.get(b_id).unwrap().next.lock().unwrap().unwrap();
        assert_eq!(next_of_b, a_id);

        assert_eq!(arena.release_all(), 2);
        assert!(arena.get(a_id).is_none());
    }

    #[test]
    fn ids_from_an_earlier_epoch_do_not_resolve() {
        let mut arena = Bookkeeper::new();
        let old = arena.alloc(NodeA(counted(&Arc::new(AtomicUsize::new(0))))).id();
        arena.release_all();
        let new = arena.alloc(NodeA(counted(&Arc::new(AtomicUsize::new(0))))).id();
        assert!(arena.get(old).is_none());
        assert!(arena.get(new).is_some());
        assert_ne!(old, new);
    }

    #[test]
    fn kinds_in_registration_order() {
        let arena = Bookkeeper::new();
        let drops = Arc::new(AtomicUsize::new(0));
        arena.alloc(NodeB(counted(&drops)));
        arena.alloc(NodeA(counted(&drops)));
        arena.alloc(NodeB(counted(&drops)));
        let kinds = arena.kinds();
        assert_eq!(kinds.len(), 2);
        assert!(kinds[0].ends_with("NodeB"));
        assert!(kinds[1].ends_with("NodeA"));
    }

    #[test]
    fn concurrent_registration() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mut arena = Bookkeeper::new();
        std::thread::scope(|s| {
            for _ in 0..4 {
                let arena = &arena;
                let drops = &drops;
                s.spawn(move || {
                    for _ in 0..25 {
                        arena.alloc(NodeA(counted(drops)));
                    }
                });
            }
        });
        assert_eq!(arena.len::<NodeA>(), 100);
        assert_eq!(arena.release_all(), 100);
        assert_eq!(drops.load(Ordering::SeqCst), 100);
    }
}
