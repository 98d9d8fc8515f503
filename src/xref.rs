use hashbrown::HashMap;

use crate::bridge::Bridge;
use crate::host::{HostEnv, HostHandle, HostRuntime, ADD_REFERENCE_METHOD, CLEAR_REFERENCES_METHOD};
use crate::managed::{ManagedObject, ManagedRuntime};
use crate::peer::PeerFields;

/// One strongly connected component of bridge objects, as computed by the
/// managed collector for a single pass. The record is owned by the collector;
/// the bridge only reads `objects` and writes `is_alive`.
pub struct SccRecord {
    /// The member objects. Empty when the component consists solely of
    /// managed-only intermediaries with no host peers of their own.
    pub objects: Vec<ManagedObject>,
    /// Output: whether the whole component survived the host collection.
    pub is_alive: bool,
}

impl SccRecord {
    pub fn new(objects: Vec<ManagedObject>) -> Self {
        Self {
            objects,
            is_alive: false,
        }
    }
}

/// A directed reachability edge between two components, by index into the
/// pass's SCC slice.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CrossReference {
    pub src: usize,
    pub dst: usize,
}

/// Where an added host reference starts or ends: a managed bridge object (we
/// go through its peer) or a raw host object such as a placeholder.
#[derive(Clone, Copy)]
enum AddReferenceTarget {
    Managed(ManagedObject),
    Raw(HostHandle),
}

/// Pass-scoped side table mapping the index of each object-less SCC to the
/// placeholder fabricated for it. Dropped before the pass returns; nothing of
/// it survives into the SCC records.
type PlaceholderTable = HashMap<usize, HostHandle, ahash::RandomState>;

impl<M: ManagedRuntime, H: HostRuntime> Bridge<M, H> {
    /// Entry point for the managed collector's bridge-processing phase.
    ///
    /// Runs the full pass synchronously on the calling thread: mirror the SCC
    /// graph into the host heap, drive one host collection, reconcile the
    /// outcome into every record's `is_alive`. The managed collector must
    /// guarantee exactly one pass in flight process-wide; this function is
    /// neither reentrant nor protected against concurrent invocation.
    pub fn process_cross_references(&self, sccs: &mut [SccRecord], xrefs: &[CrossReference]) {
        if self.is_disabled() {
            return;
        }

        if self.config().verbose {
            self.dump_pass(sccs, xrefs);
        }

        let env = self.ensure_env();

        self.set_processing_flag(true);
        let placeholders = self.prepare_for_host_collection(&env, sccs, xrefs);

        env.collect();

        self.cleanup_after_host_collection(&env, sccs, placeholders);
        self.set_processing_flag(false);
    }

    fn dump_pass(&self, sccs: &[SccRecord], xrefs: &[CrossReference]) {
        println!(
            "cross references callback invoked with {} sccs and {} xrefs.",
            sccs.len(),
            xrefs.len()
        );
        for (i, scc) in sccs.iter().enumerate() {
            println!("group {} with {} objects", i, scc.objects.len());
            for &obj in &scc.objects {
                let handle = self
                    .registry()
                    .info_for_object(self.runtime(), obj)
                    .map(|info| PeerFields::new(self.runtime(), info, obj).handle())
                    .unwrap_or(HostHandle::NULL);
                let klass = self.runtime().object_class(obj);
                println!(
                    "\tobj {:p} [{}::{}] handle {:p}",
                    obj,
                    self.runtime().class_namespace(klass),
                    self.runtime().class_name(klass),
                    handle
                );
            }
        }
        for (i, xref) in xrefs.iter().enumerate() {
            println!("xref [{}] {} -> {}", i, xref.src, xref.dst);
        }
    }

    /// Phase 1 and 2 up to the collection itself: normalize every SCC to a
    /// single root host object, materialize the cross edges, then hand the
    /// whole graph over to the host collector by downgrading everything the
    /// bridge holds to weak references.
    fn prepare_for_host_collection(
        &self,
        env: &H::Env,
        sccs: &[SccRecord],
        xrefs: &[CrossReference],
    ) -> PlaceholderTable {
        let mut placeholders = PlaceholderTable::default();

        // During the collection an SCC has to behave like a single object. A
        // component of N>1 members is linked into a reference ring so the host
        // collector's own cycle handling keeps or drops it as a unit; a
        // component of 0 members gets a throwaway placeholder to occupy its
        // position in the graph.
        for (index, scc) in sccs.iter().enumerate() {
            if scc.objects.len() > 1 {
                let first = scc.objects[0];
                let mut prev = first;
                for &current in &scc.objects[1..] {
                    self.add_reference(
                        env,
                        AddReferenceTarget::Managed(prev),
                        AddReferenceTarget::Managed(current),
                    );
                    prev = current;
                }
                self.add_reference(
                    env,
                    AddReferenceTarget::Managed(prev),
                    AddReferenceTarget::Managed(first),
                );
            } else if scc.objects.is_empty() {
                let peer = env.new_placeholder();
                abort_unless!(
                    !peer.is_null(),
                    "host runtime failed to allocate a placeholder object"
                );
                self.strong_ref_created(env, HostHandle::NULL, peer);
                placeholders.insert(index, peer);
            }
        }

        for xref in xrefs {
            let src = self.scc_root(sccs, &placeholders, xref.src);
            let dst = self.scc_root(sccs, &placeholders, xref.dst);
            self.add_reference(env, src, dst);
        }

        // With the edges in place the placeholders must stop acting as roots:
        // swap the table's strong handles for weak ones so the host collector
        // sees a placeholder only through the edges materialized above.
        for handle in placeholders.values_mut() {
            let strong = *handle;
            let weak = env.new_weak_ref(strong);
            self.weak_ref_created(env, strong, weak);
            self.strong_ref_deleted(env, strong);
            env.delete_strong_ref(strong);
            *handle = weak;
        }

        // Switch every member to a weak reference; the host trace, not the
        // bridge's own bookkeeping, decides what stays alive.
        for scc in sccs.iter() {
            for &obj in &scc.objects {
                self.take_weak_ref(env, obj);
            }
        }

        placeholders
    }

    /// Root host object of the SCC at `index`: a single member's own peer, any
    /// member of a ring (they stand or fall together), or the recorded
    /// placeholder for an object-less component.
    fn scc_root(
        &self,
        sccs: &[SccRecord],
        placeholders: &PlaceholderTable,
        index: usize,
    ) -> AddReferenceTarget {
        let scc = &sccs[index];
        if let Some(&first) = scc.objects.first() {
            AddReferenceTarget::Managed(first)
        } else {
            let peer = placeholders.get(&index);
            abort_unless!(
                peer.is_some(),
                "no placeholder recorded for object-less component {}",
                index
            );
            AddReferenceTarget::Raw(*peer.unwrap())
        }
    }

    /// Resolves `target` to the host handle an added edge should start or end
    /// at, plus the peer view when the target is a managed object.
    fn load_reference_target<'b>(
        &'b self,
        target: AddReferenceTarget,
    ) -> Option<(HostHandle, Option<PeerFields<'b, M>>)> {
        match target {
            AddReferenceTarget::Managed(obj) => {
                let info = self.registry().info_for_object(self.runtime(), obj)?;
                let peer = PeerFields::new(self.runtime(), info, obj);
                Some((peer.handle(), Some(peer)))
            }
            AddReferenceTarget::Raw(handle) => Some((handle, None)),
        }
    }

    /// Adds a host-visible edge from `target` to `referenced`.
    ///
    /// Failure (the receiving peer type lacks the method) is tolerated but
    /// degrades precision: the host collector will not see this edge and may
    /// reclaim the destination early. Successful edges into a real managed
    /// object's peer are flagged on the object so the cleanup phase knows to
    /// ask the peer to drop them again.
    fn add_reference(
        &self,
        env: &H::Env,
        target: AddReferenceTarget,
        referenced: AddReferenceTarget,
    ) -> bool {
        let (handle, peer) = match self.load_reference_target(target) {
            Some(loaded) => loaded,
            None => return false,
        };
        let (referenced_handle, _) = match self.load_reference_target(referenced) {
            Some(loaded) => loaded,
            None => return false,
        };

        let success = env.call_object_method(handle, ADD_REFERENCE_METHOD, referenced_handle);
        if success {
            if let Some(peer) = &peer {
                peer.set_refs_added(true);
            }
        }

        if self.config().verbose {
            if success {
                println!(
                    "Added reference for {} to {}",
                    self.describe_target(target),
                    self.describe_target(referenced)
                );
            } else {
                eprintln!(
                    "Missing {} method for {}",
                    ADD_REFERENCE_METHOD,
                    self.describe_target(target)
                );
            }
        }

        success
    }

    fn describe_target(&self, target: AddReferenceTarget) -> String {
        match target {
            AddReferenceTarget::Managed(obj) => {
                let klass = self.runtime().object_class(obj);
                format!(
                    "object of class {}.{}",
                    self.runtime().class_namespace(klass),
                    self.runtime().class_name(klass)
                )
            }
            AddReferenceTarget::Raw(handle) => format!("<temporary object {:p}>", handle),
        }
    }

    /// Phase 3: promote every member back to strong to see what survived,
    /// derive per-SCC liveness, clear pass-scoped edges off the survivors and
    /// drop the placeholder table.
    fn cleanup_after_host_collection(
        &self,
        env: &H::Env,
        sccs: &mut [SccRecord],
        placeholders: PlaceholderTable,
    ) {
        let mut total = 0usize;
        let mut alive = 0usize;

        for scc in sccs.iter() {
            for &obj in &scc.objects {
                self.take_strong_ref(env, obj);
                total += 1;
            }
        }

        for (index, scc) in sccs.iter_mut().enumerate() {
            scc.is_alive = false;

            for (position, &obj) in scc.objects.iter().enumerate() {
                let info = match self.registry().info_for_object(self.runtime(), obj) {
                    Some(info) => info,
                    None => continue,
                };
                let peer = PeerFields::new(self.runtime(), info, obj);
                let handle = peer.handle();

                if !handle.is_null() {
                    alive += 1;
                    // Members of one component live or die together; a mix
                    // means the ring from phase 1 was not honored.
                    abort_unless!(
                        position == 0 || scc.is_alive,
                        "strongly connected component {} must be alive",
                        index
                    );
                    scc.is_alive = true;

                    if peer.refs_added()
                        && !env.call_void_method(handle, CLEAR_REFERENCES_METHOD)
                    {
                        logln_if!(
                            self.config().verbose,
                            "Missing {} method for {}",
                            CLEAR_REFERENCES_METHOD,
                            self.describe_target(AddReferenceTarget::Managed(obj))
                        );
                    }
                } else {
                    abort_unless!(
                        !scc.is_alive,
                        "strongly connected component {} must NOT be alive",
                        index
                    );
                }
            }
        }

        // The placeholders were collectable the moment their strong handles
        // went away in the prepare step; all that is left to drop here are the
        // weak handles the side table kept for them.
        for (_, weak) in placeholders {
            self.weak_ref_deleted(env, weak);
            env.delete_weak_ref(weak);
        }

        logln_if!(
            self.config().verbose,
            "bridge pass summary: {} objects tested - resurrecting {}.",
            total,
            alive
        );
    }
}
