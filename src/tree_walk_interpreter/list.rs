use std::{
    cell::RefCell,
    fmt::{Debug, Display},
    rc::Rc,
};

use super::{ExecutionErrorKind, Value};

type Storage = RefCell<Vec<Value>>;

/// A growable list. Clones share the same backing storage, so a list bound
/// to two variables is mutated through either of them.
#[derive(Clone, Default)]
pub struct List(Rc<Storage>);

impl List {
    pub fn new(values: Vec<Value>) -> Self {
        Self(Rc::new(RefCell::new(values)))
    }

    fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn append(&self, value: Value) {
        self.0.borrow_mut().push(value);
    }

    pub fn get(&self, index: i64) -> Result<Value, ExecutionErrorKind> {
        let index = self.checked_index(index)?;
        Ok(self.0.borrow()[index].clone())
    }

    pub fn set(&self, index: i64, value: Value) -> Result<(), ExecutionErrorKind> {
        let index = self.checked_index(index)?;
        self.0.borrow_mut()[index] = value;
        Ok(())
    }

    pub fn remove(&self, index: i64) -> Result<Value, ExecutionErrorKind> {
        let index = self.checked_index(index)?;
        Ok(self.0.borrow_mut().remove(index))
    }

    /// A new list holding the elements of both, in order.
    pub fn concat(&self, other: &List) -> List {
        let mut values = self.to_vec();
        values.extend(other.0.borrow().iter().cloned());
        List::new(values)
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.0.borrow().clone()
    }

    pub fn ptr_eq(&self, other: &List) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Dispatches a `.method(args)` call made on this list.
    pub fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, ExecutionErrorKind> {
        match method {
            "append" => {
                let [value] = expect_args::<1>(method, args)?;
                self.append(value);
                Ok(Value::List(self.clone()))
            }
            "get" => {
                let [index] = expect_args::<1>(method, args)?;
                self.get(index.as_index()?)
            }
            "remove" => {
                let [index] = expect_args::<1>(method, args)?;
                self.remove(index.as_index()?)
            }
            "set" => {
                let [index, value] = expect_args::<2>(method, args)?;
                self.set(index.as_index()?, value)?;
                Ok(Value::List(self.clone()))
            }
            "len" => {
                let [] = expect_args::<0>(method, args)?;
                let len = i64::try_from(self.len())
                    .map_err(|_| ExecutionErrorKind::IntegerOverflow)?;
                Ok(Value::Integer(len))
            }
            _ => Err(ExecutionErrorKind::UnknownMethod(method.to_string())),
        }
    }

    fn checked_index(&self, index: i64) -> Result<usize, ExecutionErrorKind> {
        let len = self.len();
        usize::try_from(index)
            .ok()
            .filter(|i| *i < len)
            .ok_or(ExecutionErrorKind::IndexOutOfBounds { index, len })
    }
}

fn expect_args<const N: usize>(
    method: &str,
    args: Vec<Value>,
) -> Result<[Value; N], ExecutionErrorKind> {
    let found = args.len();
    args.try_into()
        .map_err(|_| ExecutionErrorKind::InvalidMethodArity {
            method: method.to_string(),
            expected: N,
            found,
        })
}

impl List {
    /// Element-wise equality. `active` holds the pairs of lists already being
    /// compared further up, which are taken as equal so self-containing lists
    /// terminate.
    fn eq_nested(
        &self,
        other: &List,
        active: &mut Vec<(*const Storage, *const Storage)>,
    ) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        let pair = (Rc::as_ptr(&self.0), Rc::as_ptr(&other.0));
        if active.contains(&pair) {
            return true;
        }

        let (left, right) = (self.0.borrow(), other.0.borrow());
        if left.len() != right.len() {
            return false;
        }

        active.push(pair);
        let equal = left.iter().zip(right.iter()).all(|elements| match elements {
            (Value::List(a), Value::List(b)) => a.eq_nested(b, active),
            (a, b) => a == b,
        });
        active.pop();
        equal
    }

    /// Writes the list, printing `[...]` for a list already being written
    /// further up.
    fn fmt_nested(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        active: &mut Vec<*const Storage>,
    ) -> std::fmt::Result {
        let ptr = Rc::as_ptr(&self.0);
        if active.contains(&ptr) {
            return write!(f, "[...]");
        }

        active.push(ptr);
        write!(f, "[")?;
        for (i, value) in self.0.borrow().iter().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            match value {
                Value::List(list) => list.fmt_nested(f, active)?,
                value => write!(f, "{}", value.quoted())?,
            }
        }
        active.pop();
        write!(f, "]")
    }
}

impl PartialEq for List {
    fn eq(&self, other: &Self) -> bool {
        self.eq_nested(other, &mut Vec::new())
    }
}

impl Display for List {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.fmt_nested(f, &mut Vec::new())
    }
}

impl Debug for List {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "List(")?;
        self.fmt_nested(f, &mut Vec::new())?;
        write!(f, ")")
    }
}
