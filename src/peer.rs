use crate::bridge::Bridge;
use crate::host::{HostEnv, HostRuntime};
use crate::managed::{ManagedObject, ManagedRuntime};
use crate::registry::BridgeClassInfo;

/// Reference kind recorded in a bridge object's `peer_handle_kind` member.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(i32)]
pub enum PeerRefKind {
    Strong = 1,
    Weak = 2,
}

impl PeerRefKind {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(PeerRefKind::Strong),
            2 => Some(PeerRefKind::Weak),
            _ => None,
        }
    }
}

/// Capability view over the bridge-relevant members of one managed object.
///
/// Everything above this type manipulates peer state exclusively through these
/// accessors; nothing else in the crate touches managed fields directly.
pub struct PeerFields<'a, M: ManagedRuntime> {
    runtime: &'a M,
    info: BridgeClassInfo,
    obj: ManagedObject,
}

impl<'a, M: ManagedRuntime> PeerFields<'a, M> {
    pub fn new(runtime: &'a M, info: BridgeClassInfo, obj: ManagedObject) -> Self {
        Self { runtime, info, obj }
    }

    pub fn object(&self) -> ManagedObject {
        self.obj
    }

    pub fn handle(&self) -> crate::host::HostHandle {
        self.runtime.get_handle_field(self.obj, self.info.peer_handle)
    }

    pub fn set_handle(&self, value: crate::host::HostHandle) {
        self.runtime
            .set_handle_field(self.obj, self.info.peer_handle, value)
    }

    pub fn kind(&self) -> Option<PeerRefKind> {
        PeerRefKind::from_i32(
            self.runtime
                .get_i32_field(self.obj, self.info.peer_handle_kind),
        )
    }

    pub fn set_kind(&self, kind: PeerRefKind) {
        self.runtime
            .set_i32_field(self.obj, self.info.peer_handle_kind, kind.as_i32())
    }

    pub fn refs_added(&self) -> bool {
        self.runtime
            .get_i32_field(self.obj, self.info.references_added)
            != 0
    }

    pub fn set_refs_added(&self, value: bool) {
        self.runtime
            .set_i32_field(self.obj, self.info.references_added, value as i32)
    }

    pub fn has_weak_slot(&self) -> bool {
        self.info.weak_peer_handle.is_some()
    }

    fn weak_slot(&self) -> crate::managed::ManagedField {
        abort_unless!(
            self.has_weak_slot(),
            "type of managed object {:p} has no weak_peer_handle member but the wrapper path needs one",
            self.obj
        );
        self.info.weak_peer_handle.unwrap()
    }

    pub fn weak_wrapper(&self) -> crate::host::HostHandle {
        self.runtime.get_handle_field(self.obj, self.weak_slot())
    }

    pub fn set_weak_wrapper(&self, value: crate::host::HostHandle) {
        self.runtime
            .set_handle_field(self.obj, self.weak_slot(), value)
    }
}

impl<M: ManagedRuntime, H: HostRuntime> Bridge<M, H> {
    /// Demotes `obj`'s host reference from strong to weak.
    ///
    /// The weak reference is created before the strong one is released so the
    /// host object is referenced at every point in between. Returns false when
    /// `obj` is not a bridge object. Not safe to call concurrently for the
    /// same object; the managed collector guarantees exclusivity during a
    /// bridge pass.
    pub fn take_weak_ref(&self, env: &H::Env, obj: ManagedObject) -> bool {
        let info = match self.registry().info_for_object(self.runtime(), obj) {
            Some(info) => info,
            None => return false,
        };
        let peer = PeerFields::new(self.runtime(), info, obj);
        if self.direct_weak_refs() {
            self.take_weak_ref_direct(env, &peer)
        } else {
            self.take_weak_ref_wrapped(env, &peer)
        }
    }

    fn take_weak_ref_direct(&self, env: &H::Env, peer: &PeerFields<'_, M>) -> bool {
        let handle = peer.handle();
        self.ref_log().note(format_args!(
            "*take_weak obj={:p} handle={:p}",
            peer.object(),
            handle
        ));

        let weak = env.new_weak_ref(handle);
        self.weak_ref_created(env, handle, weak);

        peer.set_handle(weak);
        peer.set_kind(PeerRefKind::Weak);

        self.strong_ref_deleted(env, handle);
        env.delete_strong_ref(handle);
        true
    }

    /// Wrapper-object variant for hosts without reliable weak references: the
    /// peer is held through a host-side weak-reference wrapper stored in the
    /// optional `weak_peer_handle` member, and the wrapper itself is held
    /// strongly.
    fn take_weak_ref_wrapped(&self, env: &H::Env, peer: &PeerFields<'_, M>) -> bool {
        let handle = peer.handle();
        self.ref_log().note(format_args!(
            "*take_weak_wrapped obj={:p} handle={:p}",
            peer.object(),
            handle
        ));

        let wrapper = env.new_weak_wrapper(handle);
        abort_unless!(
            !wrapper.is_null(),
            "host runtime failed to allocate a weak reference wrapper"
        );
        self.weak_ref_created(env, handle, wrapper);

        peer.set_weak_wrapper(wrapper);
        peer.set_kind(PeerRefKind::Weak);

        self.strong_ref_deleted(env, handle);
        env.delete_strong_ref(handle);
        true
    }

    /// Promotes `obj`'s host reference from weak back to strong.
    ///
    /// Returns false when the host collector already reclaimed the peer; that
    /// is the expected way "this object is dead" is discovered, not an error.
    /// Either way the weak reference is released and the resulting handle
    /// (null when dead) is written back.
    pub fn take_strong_ref(&self, env: &H::Env, obj: ManagedObject) -> bool {
        let info = match self.registry().info_for_object(self.runtime(), obj) {
            Some(info) => info,
            None => return false,
        };
        let peer = PeerFields::new(self.runtime(), info, obj);
        if self.direct_weak_refs() {
            self.take_strong_ref_direct(env, &peer)
        } else {
            self.take_strong_ref_wrapped(env, &peer)
        }
    }

    fn take_strong_ref_direct(&self, env: &H::Env, peer: &PeerFields<'_, M>) -> bool {
        let weak = peer.handle();
        let handle = env.new_strong_ref(weak);
        self.ref_log().note(format_args!(
            "*try_take_strong obj={:p} -> wref={:p} handle={:p}",
            peer.object(),
            weak,
            handle
        ));
        if !handle.is_null() {
            self.strong_ref_created(env, weak, handle);
        }

        peer.set_handle(handle);
        peer.set_kind(PeerRefKind::Strong);

        self.weak_ref_deleted(env, weak);
        env.delete_weak_ref(weak);
        !handle.is_null()
    }

    fn take_strong_ref_wrapped(&self, env: &H::Env, peer: &PeerFields<'_, M>) -> bool {
        let wrapper = peer.weak_wrapper();
        let handle = env.weak_wrapper_get(wrapper);
        self.ref_log().note(format_args!(
            "*try_take_strong_wrapped obj={:p} -> wrapper={:p} handle={:p}",
            peer.object(),
            wrapper,
            handle
        ));
        if !handle.is_null() {
            self.strong_ref_created(env, wrapper, handle);
        }

        self.weak_ref_deleted(env, wrapper);
        env.delete_strong_ref(wrapper);
        peer.set_weak_wrapper(crate::host::HostHandle::NULL);

        peer.set_handle(handle);
        peer.set_kind(PeerRefKind::Strong);
        !handle.is_null()
    }
}
