// Ports - named, typed values shared between control code and recalls
//
// A Port is cheap to clone; every clone refers to the same storage. Scalar
// ports are lock-free single-value swaps, pointer ports hold the lock only
// for the swap itself.

use crate::audio::parameters::{AtomicF32, AtomicF64};
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Opaque payload of a pointer port
pub type PortPointer = Arc<dyn Any + Send + Sync>;

/// Value type carried by a port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    Boolean,
    Float,
    Double,
    UInt,
    Pointer,
}

/// A value read from or written to a port
#[derive(Clone)]
pub enum PortValue {
    Boolean(bool),
    Float(f32),
    Double(f64),
    UInt(u64),
    Pointer(Option<PortPointer>),
}

impl PortValue {
    pub fn kind(&self) -> PortKind {
        match self {
            PortValue::Boolean(_) => PortKind::Boolean,
            PortValue::Float(_) => PortKind::Float,
            PortValue::Double(_) => PortKind::Double,
            PortValue::UInt(_) => PortKind::UInt,
            PortValue::Pointer(_) => PortKind::Pointer,
        }
    }
}

impl fmt::Debug for PortValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortValue::Boolean(v) => write!(f, "Boolean({})", v),
            PortValue::Float(v) => write!(f, "Float({})", v),
            PortValue::Double(v) => write!(f, "Double({})", v),
            PortValue::UInt(v) => write!(f, "UInt({})", v),
            PortValue::Pointer(v) => write!(f, "Pointer({})", v.is_some()),
        }
    }
}

/// Errors from port access
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Port {port} holds {expected:?}, got {found:?}")]
    TypeMismatch {
        port: String,
        expected: PortKind,
        found: PortKind,
    },
}

enum PortStorage {
    Boolean(AtomicBool),
    Float(AtomicF32),
    Double(AtomicF64),
    UInt(AtomicU64),
    Pointer(Mutex<Option<PortPointer>>),
}

struct PortInner {
    name: String,
    storage: PortStorage,
}

#[derive(Clone)]
pub struct Port {
    inner: Arc<PortInner>,
}

impl Port {
    fn with_storage(name: impl Into<String>, storage: PortStorage) -> Self {
        Self {
            inner: Arc::new(PortInner {
                name: name.into(),
                storage,
            }),
        }
    }

    pub fn boolean(name: impl Into<String>, value: bool) -> Self {
        Self::with_storage(name, PortStorage::Boolean(AtomicBool::new(value)))
    }

    pub fn float(name: impl Into<String>, value: f32) -> Self {
        Self::with_storage(name, PortStorage::Float(AtomicF32::new(value)))
    }

    pub fn double(name: impl Into<String>, value: f64) -> Self {
        Self::with_storage(name, PortStorage::Double(AtomicF64::new(value)))
    }

    pub fn uint(name: impl Into<String>, value: u64) -> Self {
        Self::with_storage(name, PortStorage::UInt(AtomicU64::new(value)))
    }

    pub fn pointer(name: impl Into<String>, value: Option<PortPointer>) -> Self {
        Self::with_storage(name, PortStorage::Pointer(Mutex::new(value)))
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn kind(&self) -> PortKind {
        match &self.inner.storage {
            PortStorage::Boolean(_) => PortKind::Boolean,
            PortStorage::Float(_) => PortKind::Float,
            PortStorage::Double(_) => PortKind::Double,
            PortStorage::UInt(_) => PortKind::UInt,
            PortStorage::Pointer(_) => PortKind::Pointer,
        }
    }

    /// Check whether two handles share the same storage
    pub fn ptr_eq(&self, other: &Port) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn read(&self) -> PortValue {
        match &self.inner.storage {
            PortStorage::Boolean(v) => PortValue::Boolean(v.load(Ordering::Acquire)),
            PortStorage::Float(v) => PortValue::Float(v.get()),
            PortStorage::Double(v) => PortValue::Double(v.get()),
            PortStorage::UInt(v) => PortValue::UInt(v.load(Ordering::Acquire)),
            PortStorage::Pointer(v) => {
                let guard = v.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                PortValue::Pointer(guard.clone())
            }
        }
    }

    /// Write a value of the port's own kind
    pub fn write(&self, value: PortValue) -> Result<(), PortError> {
        match (&self.inner.storage, value) {
            (PortStorage::Boolean(v), PortValue::Boolean(new)) => v.store(new, Ordering::Release),
            (PortStorage::Float(v), PortValue::Float(new)) => v.set(new),
            (PortStorage::Double(v), PortValue::Double(new)) => v.set(new),
            (PortStorage::UInt(v), PortValue::UInt(new)) => v.store(new, Ordering::Release),
            (PortStorage::Pointer(v), PortValue::Pointer(new)) => {
                let mut guard = v.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                *guard = new;
            }
            (_, other) => {
                return Err(PortError::TypeMismatch {
                    port: self.inner.name.clone(),
                    expected: self.kind(),
                    found: other.kind(),
                });
            }
        }

        Ok(())
    }

    /// Read as bool; numeric ports are true when non-zero
    pub fn get_bool(&self) -> bool {
        match self.read() {
            PortValue::Boolean(v) => v,
            PortValue::Float(v) => v != 0.0,
            PortValue::Double(v) => v != 0.0,
            PortValue::UInt(v) => v != 0,
            PortValue::Pointer(v) => v.is_some(),
        }
    }

    /// Read as f64; booleans read 0.0/1.0, pointers 0.0
    pub fn get_f64(&self) -> f64 {
        match self.read() {
            PortValue::Boolean(v) => {
                if v {
                    1.0
                } else {
                    0.0
                }
            }
            PortValue::Float(v) => v as f64,
            PortValue::Double(v) => v,
            PortValue::UInt(v) => v as f64,
            PortValue::Pointer(_) => 0.0,
        }
    }

    /// Store a numeric value converted to the port's kind
    pub fn set_f64(&self, value: f64) -> Result<(), PortError> {
        let converted = match self.kind() {
            PortKind::Boolean => PortValue::Boolean(value != 0.0),
            PortKind::Float => PortValue::Float(value as f32),
            PortKind::Double => PortValue::Double(value),
            PortKind::UInt => PortValue::UInt(value.max(0.0) as u64),
            PortKind::Pointer => PortValue::Double(value),
        };

        self.write(converted)
    }
}

impl fmt::Debug for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Port")
            .field("name", &self.inner.name)
            .field("value", &self.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_port_write_read() {
        let port = Port::double("bpm", 120.0);
        port.write(PortValue::Double(90.0)).unwrap();

        assert_eq!(port.get_f64(), 90.0);
        assert_eq!(port.name(), "bpm");
        assert_eq!(port.kind(), PortKind::Double);
    }

    #[test]
    fn test_port_type_mismatch() {
        let port = Port::boolean("loop", false);
        let result = port.write(PortValue::Float(1.0));

        assert_eq!(
            result,
            Err(PortError::TypeMismatch {
                port: "loop".to_string(),
                expected: PortKind::Boolean,
                found: PortKind::Float,
            })
        );
    }

    #[test]
    fn test_port_clones_share_storage() {
        let port = Port::uint("loop-end", 16);
        let writer = port.clone();

        thread::spawn(move || writer.set_f64(64.0).unwrap())
            .join()
            .unwrap();

        assert_eq!(port.get_f64(), 64.0);
        assert!(port.ptr_eq(&port.clone()));
        assert!(!port.ptr_eq(&Port::uint("loop-end", 16)));
    }

    #[test]
    fn test_pointer_port_swap() {
        let port = Port::pointer("instrument", None);
        assert!(!port.get_bool());

        let payload: PortPointer = Arc::new(String::from("piano"));
        port.write(PortValue::Pointer(Some(payload))).unwrap();

        match port.read() {
            PortValue::Pointer(Some(value)) => {
                assert_eq!(value.downcast_ref::<String>().unwrap(), "piano");
            }
            other => panic!("unexpected value {:?}", other),
        }
    }
}
