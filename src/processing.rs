use crate::bridge::Bridge;
use crate::host::HostRuntime;
use crate::managed::{ManagedClass, ManagedField, ManagedRuntime, ModuleSetId};

/// Name of the static boolean member, on the embedder-nominated runtime class,
/// that managed code polls to learn a bridge pass is in progress.
pub const PROCESSING_FLAG_MEMBER: &str = "bridge_processing";

/// Per-module-set state needed while a bridge pass is in flight: where to
/// write the managed-visible "processing" flag.
pub struct BridgeProcessingInfo {
    pub module_set: ModuleSetId,
    pub(crate) klass: ManagedClass,
    pub(crate) flag_field: ManagedField,
}

impl<M: ManagedRuntime, H: HostRuntime> Bridge<M, H> {
    /// Registers a freshly loaded module set for bridging.
    ///
    /// Prefetches the flag class, its static member and every bridge type's
    /// member handles now, because these lookups allocate through the managed
    /// runtime: made later, from inside the collector's bridge callback, they
    /// would wait on the very collection that is waiting on us.
    pub fn register_module_set(&self, module_set: ModuleSetId) {
        let flag_desc = self.processing_flag_class();
        let klass = self
            .runtime()
            .find_class(module_set, flag_desc.namespace, flag_desc.name);
        abort_unless!(
            klass.is_some(),
            "processing-flag class {}.{} not found in module set {}",
            flag_desc.namespace,
            flag_desc.name,
            module_set.0
        );
        let klass = klass.unwrap();

        let flag_field = self.runtime().static_field(klass, PROCESSING_FLAG_MEMBER);
        abort_unless!(
            flag_field.is_some(),
            "class {}.{} has no static {} member",
            flag_desc.namespace,
            flag_desc.name,
            PROCESSING_FLAG_MEMBER
        );

        self.module_sets().lock().push(BridgeProcessingInfo {
            module_set,
            klass,
            flag_field: flag_field.unwrap(),
        });

        self.registry().resolve_all(self.runtime(), module_set);
    }

    /// Forgets a module set that is about to unload. When the last set goes,
    /// the registry is emptied too: its handles point into memory the runtime
    /// is about to release.
    ///
    /// A thread can still race into classification between the clear and the
    /// unload's stop-the-world and see a bridge class as transparent; the
    /// worst outcome is one leaked peer, which is accepted.
    pub fn unregister_module_set(&self, module_set: ModuleSetId) {
        let mut sets = self.module_sets().lock();
        sets.retain(|info| info.module_set != module_set);
        if sets.is_empty() {
            self.registry().clear();
        }
    }

    /// Flips the managed-visible "bridge pass in progress" flag in every
    /// registered module set.
    pub(crate) fn set_processing_flag(&self, value: bool) {
        for info in self.module_sets().lock().iter() {
            self.runtime()
                .set_static_bool_field(info.klass, info.flag_field, value);
        }
    }
}
