use std::fmt;
use std::os::raw::c_void;

use crate::host::HostHandle;

/// Opaque pointer to a managed object. Valid for the duration of the call it
/// was passed into; the managed collector may move or reclaim it afterwards.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct ManagedObject(pub *mut c_void);

impl ManagedObject {
    #[inline(always)]
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

impl fmt::Pointer for ManagedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:p}", self.0)
    }
}

/// Opaque handle to a managed class.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct ManagedClass(pub *mut c_void);

impl ManagedClass {
    pub const NULL: ManagedClass = ManagedClass(std::ptr::null_mut());

    #[inline(always)]
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

/// Opaque handle to a managed instance or static member.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct ManagedField(pub *mut c_void);

impl ManagedField {
    pub const NULL: ManagedField = ManagedField(std::ptr::null_mut());

    #[inline(always)]
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

/// Identifies one loaded set of managed modules. Only one set is
/// bridge-registered at a time today, but nothing below assumes that.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ModuleSetId(pub usize);

/// Introspection surface of the managed runtime, as the bridge consumes it.
///
/// All of these are expected to be callable from any attached thread; the
/// bridge never caches anything across calls except through
/// [`BridgeRegistry`](crate::registry::BridgeRegistry).
pub trait ManagedRuntime {
    /// Looks `namespace.name` up in the given module set.
    fn find_class(&self, module_set: ModuleSetId, namespace: &str, name: &str)
        -> Option<ManagedClass>;

    fn instance_field(&self, klass: ManagedClass, name: &str) -> Option<ManagedField>;

    fn static_field(&self, klass: ManagedClass, name: &str) -> Option<ManagedField>;

    fn object_class(&self, obj: ManagedObject) -> ManagedClass;

    fn is_subclass_of(&self, klass: ManagedClass, of: ManagedClass) -> bool;

    fn class_namespace(&self, klass: ManagedClass) -> String;

    fn class_name(&self, klass: ManagedClass) -> String;

    /// Reads a host-handle-typed instance field out of `obj`.
    fn get_handle_field(&self, obj: ManagedObject, field: ManagedField) -> HostHandle;

    fn set_handle_field(&self, obj: ManagedObject, field: ManagedField, value: HostHandle);

    fn get_i32_field(&self, obj: ManagedObject, field: ManagedField) -> i32;

    fn set_i32_field(&self, obj: ManagedObject, field: ManagedField, value: i32);

    /// Writes a static boolean field. Used for the managed-visible
    /// "bridge pass in progress" flag.
    fn set_static_bool_field(&self, klass: ManagedClass, field: ManagedField, value: bool);
}
