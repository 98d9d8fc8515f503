use crossbeam_utils::atomic::AtomicCell;

use crate::managed::{ManagedClass, ManagedField, ManagedObject, ManagedRuntime, ModuleSetId};

/// Name of the instance member holding the host-side peer handle.
pub const PEER_HANDLE_MEMBER: &str = "peer_handle";
/// Name of the instance member recording the peer handle's reference kind.
pub const PEER_HANDLE_KIND_MEMBER: &str = "peer_handle_kind";
/// Name of the instance member flagging that pass-scoped references were added
/// to the peer and must be cleared on survival.
pub const REFERENCES_ADDED_MEMBER: &str = "references_added";
/// Name of the optional member storing a weak-reference wrapper on hosts
/// without reliable native weak references.
pub const WEAK_PEER_HANDLE_MEMBER: &str = "weak_peer_handle";

/// Names one managed type whose instances may have a host peer. The table of
/// these is fixed for the life of the process.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BridgeTypeDescriptor {
    pub namespace: &'static str,
    pub name: &'static str,
}

/// Resolved member handles for one descriptor. Snapshot of a registry row;
/// only handed out when the row is fully populated.
#[derive(Clone, Copy)]
pub struct BridgeClassInfo {
    pub klass: ManagedClass,
    pub peer_handle: ManagedField,
    pub peer_handle_kind: ManagedField,
    pub references_added: ManagedField,
    pub weak_peer_handle: Option<ManagedField>,
}

/// One registry row. Fields are individual atomic cells rather than one locked
/// struct so that [`BridgeRegistry::clear`] can run concurrently with readers:
/// a reader sees either a usable pointer or null per field, never a torn one.
struct InfoRow {
    klass: AtomicCell<ManagedClass>,
    peer_handle: AtomicCell<ManagedField>,
    peer_handle_kind: AtomicCell<ManagedField>,
    references_added: AtomicCell<ManagedField>,
    weak_peer_handle: AtomicCell<ManagedField>,
}

impl InfoRow {
    fn empty() -> Self {
        Self {
            klass: AtomicCell::new(ManagedClass::NULL),
            peer_handle: AtomicCell::new(ManagedField::NULL),
            peer_handle_kind: AtomicCell::new(ManagedField::NULL),
            references_added: AtomicCell::new(ManagedField::NULL),
            weak_peer_handle: AtomicCell::new(ManagedField::NULL),
        }
    }
}

/// Outcome of classifying a managed class against the registry.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Lookup {
    /// The class is (a subclass of) the descriptor at this index.
    Found(usize),
    /// Resolution has happened and the class is not a bridge type.
    NotBridge,
    /// No descriptor is resolved yet; classification was asked too early or
    /// after the owning module set unloaded.
    Unresolved,
}

/// Process-wide table of resolved bridge type metadata.
///
/// Populated when a module set registers, cleared field-at-a-time when it
/// unloads. Concurrent `resolve_all` calls for the same module set race
/// benignly: every writer stores identical values, so no lock is taken.
pub struct BridgeRegistry {
    descriptors: &'static [BridgeTypeDescriptor],
    rows: Box<[InfoRow]>,
}

impl BridgeRegistry {
    pub fn new(descriptors: &'static [BridgeTypeDescriptor]) -> Self {
        let rows = descriptors
            .iter()
            .map(|_| InfoRow::empty())
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { descriptors, rows }
    }

    pub fn descriptors(&self) -> &'static [BridgeTypeDescriptor] {
        self.descriptors
    }

    /// Resolves every descriptor against `module_set` and populates the table.
    ///
    /// The pass dereferences the three mandatory members unconditionally, so a
    /// missing type or member is unrecoverable: the process aborts naming what
    /// was absent. The optional weak member stays null when the type lacks it.
    pub fn resolve_all<M: ManagedRuntime>(&self, runtime: &M, module_set: ModuleSetId) {
        for (index, desc) in self.descriptors.iter().enumerate() {
            let klass = runtime.find_class(module_set, desc.namespace, desc.name);
            abort_unless!(
                klass.is_some(),
                "bridge type {}.{} not found in module set {}",
                desc.namespace,
                desc.name,
                module_set.0
            );
            let klass = klass.unwrap();

            let peer_handle = runtime.instance_field(klass, PEER_HANDLE_MEMBER);
            let peer_handle_kind = runtime.instance_field(klass, PEER_HANDLE_KIND_MEMBER);
            let references_added = runtime.instance_field(klass, REFERENCES_ADDED_MEMBER);
            let weak_peer_handle = runtime.instance_field(klass, WEAK_PEER_HANDLE_MEMBER);

            let mut missing: Vec<&str> = Vec::new();
            if peer_handle.is_none() {
                missing.push(PEER_HANDLE_MEMBER);
            }
            if peer_handle_kind.is_none() {
                missing.push(PEER_HANDLE_KIND_MEMBER);
            }
            if references_added.is_none() {
                missing.push(REFERENCES_ADDED_MEMBER);
            }
            abort_unless!(
                missing.is_empty(),
                "bridge type {}.{} is missing mandatory member(s): {}",
                desc.namespace,
                desc.name,
                missing.join(", ")
            );

            // Store the class last: readers treat a non-null class as "row is
            // usable" and dereference the member fields without checking.
            let row = &self.rows[index];
            row.peer_handle.store(peer_handle.unwrap());
            row.peer_handle_kind.store(peer_handle_kind.unwrap());
            row.references_added.store(references_added.unwrap());
            row.weak_peer_handle
                .store(weak_peer_handle.unwrap_or(ManagedField::NULL));
            row.klass.store(klass);
        }
    }

    /// Empties every row, one field at a time. Run when the owning module set
    /// unloads; anything classifying classes concurrently observes the rows
    /// going null and falls back to [`Lookup::Unresolved`].
    pub fn clear(&self) {
        for row in self.rows.iter() {
            row.klass.store(ManagedClass::NULL);
            row.peer_handle.store(ManagedField::NULL);
            row.peer_handle_kind.store(ManagedField::NULL);
            row.references_added.store(ManagedField::NULL);
            row.weak_peer_handle.store(ManagedField::NULL);
        }
    }

    fn snapshot(&self, index: usize) -> Option<BridgeClassInfo> {
        let row = &self.rows[index];
        let klass = row.klass.load();
        if klass.is_null() {
            return None;
        }
        let weak = row.weak_peer_handle.load();
        Some(BridgeClassInfo {
            klass,
            peer_handle: row.peer_handle.load(),
            peer_handle_kind: row.peer_handle_kind.load(),
            references_added: row.references_added.load(),
            weak_peer_handle: if weak.is_null() { None } else { Some(weak) },
        })
    }

    /// Classifies `klass` against the resolved rows, walking the subclass
    /// relation so subtypes of a bridge type bridge too.
    pub fn lookup<M: ManagedRuntime>(&self, runtime: &M, klass: ManagedClass) -> Lookup {
        let mut unresolved = 0usize;
        for (index, row) in self.rows.iter().enumerate() {
            let candidate = row.klass.load();
            if candidate.is_null() {
                unresolved += 1;
                continue;
            }
            if klass == candidate || runtime.is_subclass_of(klass, candidate) {
                return Lookup::Found(index);
            }
        }
        if unresolved == self.rows.len() {
            Lookup::Unresolved
        } else {
            Lookup::NotBridge
        }
    }

    pub fn info_for_class<M: ManagedRuntime>(
        &self,
        runtime: &M,
        klass: ManagedClass,
    ) -> Option<BridgeClassInfo> {
        if klass.is_null() {
            return None;
        }
        match self.lookup(runtime, klass) {
            Lookup::Found(index) => self.snapshot(index),
            _ => None,
        }
    }

    pub fn info_for_object<M: ManagedRuntime>(
        &self,
        runtime: &M,
        obj: ManagedObject,
    ) -> Option<BridgeClassInfo> {
        if obj.is_null() {
            return None;
        }
        self.info_for_class(runtime, runtime.object_class(obj))
    }
}
