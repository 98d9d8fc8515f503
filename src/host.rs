use std::fmt;
use std::os::raw::c_void;

/// Raw handle to a host-runtime object reference.
///
/// The bit pattern is owned by the host; the bridge only stores it, compares
/// it against null and passes it back. One host object may be behind many
/// distinct handle values at once.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct HostHandle(pub *mut c_void);

impl HostHandle {
    pub const NULL: HostHandle = HostHandle(std::ptr::null_mut());

    #[inline(always)]
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

impl fmt::Pointer for HostHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:p}", self.0)
    }
}

impl fmt::Debug for HostHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostHandle({:p})", self.0)
    }
}

/// Reference kind of a handle as observed by the host. Diagnostics only.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum HostRefType {
    Strong,
    Weak,
    Invalid,
    Unknown,
}

impl HostRefType {
    /// Single-character rendering used in reference log lines.
    pub fn as_char(self) -> char {
        match self {
            HostRefType::Strong => 'S',
            HostRefType::Weak => 'W',
            HostRefType::Invalid => 'I',
            HostRefType::Unknown => '*',
        }
    }
}

/// Well-known instance method a cooperating host peer defines to accept an
/// extra traced edge for the duration of a bridge pass.
pub const ADD_REFERENCE_METHOD: &str = "bridgeAddReference";
/// Well-known instance method that drops every edge previously accepted
/// through [`ADD_REFERENCE_METHOD`].
pub const CLEAR_REFERENCES_METHOD: &str = "bridgeClearReferences";

/// Per-thread view of the host environment, in the shape the bridge needs.
///
/// Implementations must consume any exception the host throws inside one of
/// these calls; errors surface only as null handles or `false` returns.
pub trait HostEnv {
    /// Creates a strong reference to the object behind `target`. Returns null
    /// when `target` is a weak reference whose object is already gone.
    fn new_strong_ref(&self, target: HostHandle) -> HostHandle;

    fn delete_strong_ref(&self, handle: HostHandle);

    /// Creates a weak reference to the object behind `target`.
    fn new_weak_ref(&self, target: HostHandle) -> HostHandle;

    fn delete_weak_ref(&self, handle: HostHandle);

    /// Reports how the host classifies `handle`.
    fn ref_type(&self, handle: HostHandle) -> HostRefType;

    /// Invokes the void instance method `method` on `receiver` with one object
    /// argument. Returns false (with the host exception cleared) when the
    /// receiver's type does not define the method.
    fn call_object_method(&self, receiver: HostHandle, method: &str, arg: HostHandle) -> bool;

    /// Invokes the void no-argument instance method `method` on `receiver`.
    /// Same failure contract as [`HostEnv::call_object_method`].
    fn call_void_method(&self, receiver: HostHandle, method: &str) -> bool;

    /// Allocates a fresh host object of the placeholder type and returns a
    /// strong reference to it. The object has no state of its own; it exists
    /// only to occupy a position in the host object graph.
    fn new_placeholder(&self) -> HostHandle;

    /// Wraps `target` in a host-side weak-reference wrapper object and returns
    /// a strong reference to the wrapper. Used on hosts whose native weak
    /// references are unreliable, see [`HostRuntime::has_reliable_weak_refs`].
    fn new_weak_wrapper(&self, target: HostHandle) -> HostHandle;

    /// Reads the referent out of a wrapper made by [`HostEnv::new_weak_wrapper`].
    /// Returns a strong reference to the referent, or null once the host
    /// collector has reclaimed it.
    fn weak_wrapper_get(&self, wrapper: HostHandle) -> HostHandle;

    /// Runs one full host collection, returning only after it completes.
    fn collect(&self);
}

/// The host execution environment itself.
pub trait HostRuntime {
    type Env: HostEnv;

    /// Returns the environment for the calling thread if it is already
    /// attached to the host.
    fn current_env(&self) -> Option<Self::Env>;

    /// Attaches the calling thread to the host and returns its environment.
    /// A blocking lookup, not a long operation.
    fn attach_current_thread(&self) -> Self::Env;

    /// Whether weak references made with [`HostEnv::new_weak_ref`] reliably
    /// observe collection of their target. Hosts where they do not get the
    /// wrapper-object path instead.
    fn has_reliable_weak_refs(&self) -> bool {
        true
    }
}
