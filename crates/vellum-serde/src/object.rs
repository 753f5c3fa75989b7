//! Shared handles to live objects and arrays.

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use vellum_core::dirty::DirtyFlag;
use vellum_core::error::EngineError;

use crate::class::{Class, ClassRef};
use crate::value::Value;

/// An object the codec can walk and rebuild.
///
/// Implementors expose their enumerable fields by name and accept writes by
/// name, so the encoder can flatten them and the decoder can fill a freshly
/// constructed instance. Fields a type does not recognise should be kept
/// rather than rejected (see `StateCore` in `vellum-state`).
pub trait Serializable: Any + fmt::Debug {
    /// The class this object was constructed as.
    fn class(&self) -> ClassRef;

    /// Enumerable fields in a stable order.
    fn fields(&self) -> Vec<(String, Value)>;

    /// Writes a field by name.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Type` if a known field receives a value of the
    /// wrong kind.
    fn set_field(&mut self, key: &str, value: Value) -> Result<(), EngineError>;

    /// The dirty flag of state objects; `None` for plain data.
    fn dirty_flag(&self) -> Option<&DirtyFlag> {
        None
    }
}

/// Builds the error for a typed field that received the wrong kind of value.
#[must_use]
pub fn type_mismatch(class: &Class, field: &str, expected: &str, value: &Value) -> EngineError {
    EngineError::Type(format!(
        "`{}.{field}` expects {expected}, got {}",
        class.name(),
        value.kind_name()
    ))
}

trait ObjectCell {
    fn borrow(&self) -> Ref<'_, dyn Serializable>;
    fn borrow_mut(&self) -> RefMut<'_, dyn Serializable>;
    fn try_borrow(&self) -> Option<Ref<'_, dyn Serializable>>;
    fn try_borrow_mut(&self) -> Option<RefMut<'_, dyn Serializable>>;
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: Serializable> ObjectCell for RefCell<T> {
    fn borrow(&self) -> Ref<'_, dyn Serializable> {
        Ref::map(RefCell::borrow(self), |value| value as &dyn Serializable)
    }

    fn borrow_mut(&self) -> RefMut<'_, dyn Serializable> {
        RefMut::map(RefCell::borrow_mut(self), |value| {
            value as &mut dyn Serializable
        })
    }

    fn try_borrow(&self) -> Option<Ref<'_, dyn Serializable>> {
        RefCell::try_borrow(self)
            .ok()
            .map(|r| Ref::map(r, |value| value as &dyn Serializable))
    }

    fn try_borrow_mut(&self) -> Option<RefMut<'_, dyn Serializable>> {
        RefCell::try_borrow_mut(self)
            .ok()
            .map(|r| RefMut::map(r, |value| value as &mut dyn Serializable))
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// Shared, interior-mutable handle to a live object.
///
/// Identity is the allocation: two handles are the same object exactly when
/// [`ObjectRef::ptr_eq`] says so. The class and, for state objects, the
/// dirty flag are captured at construction and never change.
#[derive(Clone)]
pub struct ObjectRef {
    cell: Rc<dyn ObjectCell>,
    class: ClassRef,
    flag: Option<DirtyFlag>,
}

impl ObjectRef {
    /// Moves `value` into a new shared object.
    #[must_use]
    pub fn new<T: Serializable>(value: T) -> Self {
        Self::from_rc(Rc::new(RefCell::new(value)))
    }

    /// Wraps an existing typed handle without copying it.
    ///
    /// # Panics
    ///
    /// Panics if `rc` is mutably borrowed at the time of the call.
    #[must_use]
    pub fn from_rc<T: Serializable>(rc: Rc<RefCell<T>>) -> Self {
        let (class, flag) = {
            let value = RefCell::borrow(&rc);
            (value.class(), value.dirty_flag().cloned())
        };
        Self {
            cell: rc,
            class,
            flag,
        }
    }

    /// The class the object was constructed as.
    #[must_use]
    pub fn class(&self) -> ClassRef {
        self.class
    }

    /// The object's dirty flag, if it is a state object.
    #[must_use]
    pub fn dirty_flag(&self) -> Option<&DirtyFlag> {
        self.flag.as_ref()
    }

    /// Immutably borrows the object.
    ///
    /// # Panics
    ///
    /// Panics if the object is currently mutably borrowed.
    #[must_use]
    pub fn borrow(&self) -> Ref<'_, dyn Serializable> {
        self.cell.borrow()
    }

    /// Mutably borrows the object.
    ///
    /// # Panics
    ///
    /// Panics if the object is currently borrowed.
    #[must_use]
    pub fn borrow_mut(&self) -> RefMut<'_, dyn Serializable> {
        self.cell.borrow_mut()
    }

    /// Immutably borrows the object, failing instead of panicking.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidOperation` if the object is currently
    /// mutably borrowed.
    pub fn try_borrow(&self) -> Result<Ref<'_, dyn Serializable>, EngineError> {
        self.cell.try_borrow().ok_or_else(|| self.busy())
    }

    /// Mutably borrows the object, failing instead of panicking.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidOperation` if the object is currently
    /// borrowed.
    pub fn try_borrow_mut(&self) -> Result<RefMut<'_, dyn Serializable>, EngineError> {
        self.cell.try_borrow_mut().ok_or_else(|| self.busy())
    }

    /// Recovers the typed handle if the object is a `T`.
    #[must_use]
    pub fn downcast<T: Serializable>(&self) -> Option<Rc<RefCell<T>>> {
        Rc::clone(&self.cell).into_any().downcast::<RefCell<T>>().ok()
    }

    /// Returns whether both handles refer to the same object.
    #[must_use]
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        self.addr() == other.addr()
    }

    /// Address of the shared allocation, used as the identity key.
    #[must_use]
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.cell).cast::<()>().addr()
    }

    fn busy(&self) -> EngineError {
        EngineError::InvalidOperation(format!(
            "`{}` object is already borrowed",
            self.class.name()
        ))
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({}@{:#x})", self.class.name(), self.addr())
    }
}

/// Shared, interior-mutable handle to an ordered sequence of values.
#[derive(Clone, Default)]
pub struct ArrayRef(Rc<RefCell<Vec<Value>>>);

impl ArrayRef {
    /// Creates a new shared array holding `items`.
    #[must_use]
    pub fn new(items: Vec<Value>) -> Self {
        Self(Rc::new(RefCell::new(items)))
    }

    /// Immutably borrows the elements.
    #[must_use]
    pub fn borrow(&self) -> Ref<'_, Vec<Value>> {
        self.0.borrow()
    }

    /// Mutably borrows the elements.
    #[must_use]
    pub fn borrow_mut(&self) -> RefMut<'_, Vec<Value>> {
        self.0.borrow_mut()
    }

    /// Copies the element handles out of the array.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.borrow().clone()
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Whether the array has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Returns whether both handles refer to the same array.
    #[must_use]
    pub fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the shared allocation, used as the identity key.
    #[must_use]
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0).cast::<()>().addr()
    }
}

impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(items) => write!(f, "ArrayRef(len {}@{:#x})", items.len(), self.addr()),
            Err(_) => write!(f, "ArrayRef(<borrowed>@{:#x})", self.addr()),
        }
    }
}
