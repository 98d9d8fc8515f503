use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::counters::RefCounters;
use crate::host::{HostEnv, HostHandle, HostRuntime};
use crate::managed::{ManagedClass, ManagedObject, ManagedRuntime};
use crate::peer::PeerFields;
use crate::processing::BridgeProcessingInfo;
use crate::reflog::RefLog;
use crate::registry::{BridgeRegistry, BridgeTypeDescriptor, Lookup};
use crate::Config;

/// Classification of a managed class for the managed collector's marker.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ClassKind {
    /// Instances participate in bridging.
    Bridge,
    /// The collector traces through instances as usual.
    Transparent,
}

/// The bridge itself: one per process, wired between the managed runtime's
/// introspection surface and the host runtime's reference machinery.
///
/// All methods take `&self`; the contained state is either atomic, locked, or
/// (for the pass-scoped parts) local to one [`process_cross_references`]
/// invocation, whose exclusivity the managed collector guarantees.
///
/// [`process_cross_references`]: Bridge::process_cross_references
pub struct Bridge<M, H> {
    runtime: M,
    host: H,
    config: Config,
    registry: BridgeRegistry,
    counters: RefCounters,
    ref_log: RefLog,
    module_sets: Mutex<Vec<BridgeProcessingInfo>>,
    processing_flag_class: BridgeTypeDescriptor,
    disabled: AtomicBool,
    direct_weak_refs: bool,
}

impl<M: ManagedRuntime, H: HostRuntime> Bridge<M, H> {
    /// Wires a bridge up. `descriptors` is the fixed table of managed types
    /// eligible for bridging; `processing_flag_class` names the class whose
    /// static [`PROCESSING_FLAG_MEMBER`](crate::processing::PROCESSING_FLAG_MEMBER)
    /// mirrors pass state to managed code.
    pub fn new(
        runtime: M,
        host: H,
        descriptors: &'static [BridgeTypeDescriptor],
        processing_flag_class: BridgeTypeDescriptor,
        config: Config,
    ) -> Self {
        let direct_weak_refs = host.has_reliable_weak_refs();
        let ref_log = RefLog::new(config.refs_to_console, config.log_ref_stacks);
        Self {
            runtime,
            host,
            config,
            registry: BridgeRegistry::new(descriptors),
            counters: RefCounters::new(),
            ref_log,
            module_sets: Mutex::new(Vec::new()),
            processing_flag_class,
            disabled: AtomicBool::new(false),
            direct_weak_refs,
        }
    }

    /// Routes reference-kind diagnostics into `sink` (e.g. a log file) in
    /// addition to any console mirroring the config asked for.
    pub fn log_refs_to(&mut self, sink: Box<dyn Write + Send>) {
        self.ref_log.set_sink(sink);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn counters(&self) -> &RefCounters {
        &self.counters
    }

    pub fn runtime(&self) -> &M {
        &self.runtime
    }

    pub(crate) fn registry(&self) -> &BridgeRegistry {
        &self.registry
    }

    pub(crate) fn ref_log(&self) -> &RefLog {
        &self.ref_log
    }

    pub(crate) fn module_sets(&self) -> &Mutex<Vec<BridgeProcessingInfo>> {
        &self.module_sets
    }

    pub(crate) fn processing_flag_class(&self) -> BridgeTypeDescriptor {
        self.processing_flag_class
    }

    pub(crate) fn direct_weak_refs(&self) -> bool {
        self.direct_weak_refs
    }

    /// Permanently turns bridging off. From here on every class is reported
    /// transparent and [`process_cross_references`](Bridge::process_cross_references)
    /// returns without doing anything; there is no way back for the life of
    /// the process.
    pub fn disable_bridging(&self) {
        self.disabled.store(true, Ordering::Release);
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    /// Classification callback for the managed collector's marker.
    pub fn class_kind(&self, klass: ManagedClass) -> ClassKind {
        if self.is_disabled() {
            return ClassKind::Transparent;
        }
        match self.registry.lookup(&self.runtime, klass) {
            Lookup::Found(_) => ClassKind::Bridge,
            Lookup::NotBridge => ClassKind::Transparent,
            Lookup::Unresolved => {
                logln_if!(
                    self.config.verbose,
                    "asked if class {}.{} is a bridge before any bridge type resolved",
                    self.runtime.class_namespace(klass),
                    self.runtime.class_name(klass)
                );
                ClassKind::Transparent
            }
        }
    }

    pub fn is_bridge_class(&self, klass: ManagedClass) -> bool {
        self.class_kind(klass) == ClassKind::Bridge
    }

    /// Whether `obj` currently has a live host peer and should be treated as a
    /// bridge object by the collector.
    pub fn is_bridge_object(&self, obj: ManagedObject) -> bool {
        if self.is_disabled() {
            return false;
        }
        let info = match self.registry.info_for_object(&self.runtime, obj) {
            Some(info) => info,
            None => return false,
        };
        let handle = PeerFields::new(&self.runtime, info, obj).handle();
        if handle.is_null() {
            let klass = self.runtime.object_class(obj);
            logln_if!(
                self.config.verbose,
                "object of class {}.{} with null handle",
                self.runtime.class_namespace(klass),
                self.runtime.class_name(klass)
            );
            return false;
        }
        true
    }

    /// Environment of the calling thread, attaching it first if the host does
    /// not know it yet.
    pub(crate) fn ensure_env(&self) -> H::Env {
        self.host
            .current_env()
            .unwrap_or_else(|| self.host.attach_current_thread())
    }

    /// Records creation of a strong host reference: bumps the counter and,
    /// when reference logging is on, writes the event. Callable from any
    /// thread; embedders are expected to route *all* strong-reference churn
    /// through here, not only bridge-pass traffic.
    pub fn strong_ref_created(&self, env: &H::Env, source: HostHandle, created: HostHandle) -> isize {
        let strongs = self.counters.strong_inc();
        if self.ref_log.enabled() {
            self.ref_log.strong_created(
                strongs,
                self.counters.weak_count(),
                source,
                env.ref_type(source),
                created,
                env.ref_type(created),
            );
        }
        strongs
    }

    pub fn strong_ref_deleted(&self, env: &H::Env, handle: HostHandle) -> isize {
        let strongs = self.counters.strong_dec();
        if self.ref_log.enabled() {
            self.ref_log.strong_deleted(
                strongs,
                self.counters.weak_count(),
                handle,
                env.ref_type(handle),
            );
        }
        strongs
    }

    pub fn weak_ref_created(&self, env: &H::Env, source: HostHandle, created: HostHandle) -> isize {
        let weaks = self.counters.weak_inc();
        if self.ref_log.enabled() {
            self.ref_log.weak_created(
                self.counters.strong_count(),
                weaks,
                source,
                env.ref_type(source),
                created,
                env.ref_type(created),
            );
        }
        weaks
    }

    pub fn weak_ref_deleted(&self, env: &H::Env, handle: HostHandle) -> isize {
        let weaks = self.counters.weak_dec();
        if self.ref_log.enabled() {
            self.ref_log.weak_deleted(
                self.counters.strong_count(),
                weaks,
                handle,
                env.ref_type(handle),
            );
        }
        weaks
    }
}
