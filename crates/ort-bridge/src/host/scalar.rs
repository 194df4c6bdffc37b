//! Dynamically typed host scalar values (operator arguments such as `alpha`).

use std::fmt;

use super::scalar_type::ScalarType;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Long(i64),
    Double(f64),
    ComplexDouble { re: f64, im: f64 },
}

impl Scalar {
    /// Scalar type tag the framework reports for this value.
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Scalar::Bool(_) => ScalarType::Bool,
            Scalar::Long(_) => ScalarType::Long,
            Scalar::Double(_) => ScalarType::Double,
            Scalar::ComplexDouble { .. } => ScalarType::ComplexDouble,
        }
    }

    /// Real part as `f64`; complex values drop their imaginary component.
    pub fn to_f64(&self) -> f64 {
        match *self {
            Scalar::Bool(v) => {
                if v {
                    1.0
                } else {
                    0.0
                }
            }
            Scalar::Long(v) => v as f64,
            Scalar::Double(v) => v,
            Scalar::ComplexDouble { re, .. } => re,
        }
    }

    pub fn to_f32(&self) -> f32 {
        self.to_f64() as f32
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Long(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Double(value)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(v) => write!(f, "{v}"),
            Scalar::Long(v) => write!(f, "{v}"),
            Scalar::Double(v) => write!(f, "{v}"),
            Scalar::ComplexDouble { re, im } => write!(f, "({re}+{im}j)"),
        }
    }
}
