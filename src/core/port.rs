//! Slot and parameter definitions.
//!
//! Slots define the data interface of a filter: which kinds of data objects
//! it consumes and produces. Parameters are the scalar knobs, each with a
//! type, a default and optional constraints checked whenever a value is set.

use crate::core::data::DataKind;
use crate::core::types::{Value, ValueType};
use serde::{Deserialize, Serialize};

/// Direction of data flow through a slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SlotDirection {
    Input,
    Output,
}

/// Definition of an input or output slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotDefinition {
    /// Identifier used for wiring.
    pub name: String,
    /// Human readable name.
    pub display_name: String,
    /// Kind of data carried.
    pub kind: DataKind,
    /// Input or output.
    pub direction: SlotDirection,
    /// Whether an input may stay unbound.
    pub optional: bool,
    /// Longer description.
    pub description: String,
}

/// Definition of a filter parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDefinition {
    pub name: String,
    pub display_name: String,
    pub param_type: ValueType,
    pub default_value: Value,
    pub description: String,
    pub constraints: Vec<Constraint>,
}

/// Constraint on a parameter value.
///
/// Numeric constraints apply to every element of an array value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params")]
pub enum Constraint {
    Range { min: f64, max: f64 },
    MinValue(f64),
    MaxValue(f64),
    Positive,
    NonNegative,
    MinLength(usize),
    MaxLength(usize),
    NotEmpty,
    OneOf(Vec<Value>),
}

// ============================================================================
// SlotDefinition Builder Pattern
// ============================================================================

impl SlotDefinition {
    /// A required input slot.
    pub fn input(name: impl Into<String>, kind: DataKind) -> Self {
        Self::new(name.into(), kind, SlotDirection::Input)
    }

    /// An output slot.
    pub fn output(name: impl Into<String>, kind: DataKind) -> Self {
        Self::new(name.into(), kind, SlotDirection::Output)
    }

    fn new(name: String, kind: DataKind, direction: SlotDirection) -> Self {
        Self {
            display_name: name_to_display(&name),
            name,
            kind,
            direction,
            optional: false,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Allow an input to stay unbound.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Check that data of `kind` may be bound to this slot.
    pub fn check_kind(&self, kind: DataKind) -> Result<(), String> {
        if self.kind.accepts(kind) {
            Ok(())
        } else {
            Err(format!(
                "slot '{}' expects {}, got {}",
                self.name, self.kind, kind
            ))
        }
    }
}

/// `"inside_value"` becomes `"Inside Value"`.
pub(crate) fn name_to_display(name: &str) -> String {
    name.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().chain(chars).collect(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// ParameterDefinition Builder Pattern
// ============================================================================

impl ParameterDefinition {
    pub fn new(name: impl Into<String>, param_type: ValueType, default_value: Value) -> Self {
        let name = name.into();
        Self {
            display_name: name_to_display(&name),
            name,
            param_type,
            default_value,
            description: String::new(),
            constraints: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Check the type and every constraint.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        if !self.param_type.matches(value) {
            return Err(format!(
                "Type mismatch for parameter '{}': expected {}, got {}",
                self.name,
                self.param_type,
                value.get_type()
            ));
        }

        for constraint in &self.constraints {
            constraint.validate(value)?;
        }

        Ok(())
    }
}

// ============================================================================
// Constraint Validation
// ============================================================================

impl Constraint {
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        match self {
            Constraint::Range { min, max } => each_number(value, &|num| {
                if num < *min || num > *max {
                    Err(format!("Value {} is out of range [{}, {}]", num, min, max))
                } else {
                    Ok(())
                }
            }),

            Constraint::MinValue(min) => each_number(value, &|num| {
                if num < *min {
                    Err(format!("Value {} is below minimum {}", num, min))
                } else {
                    Ok(())
                }
            }),

            Constraint::MaxValue(max) => each_number(value, &|num| {
                if num > *max {
                    Err(format!("Value {} is above maximum {}", num, max))
                } else {
                    Ok(())
                }
            }),

            Constraint::Positive => each_number(value, &|num| {
                if num <= 0.0 {
                    Err(format!("Value {} must be positive", num))
                } else {
                    Ok(())
                }
            }),

            Constraint::NonNegative => each_number(value, &|num| {
                if num < 0.0 {
                    Err(format!("Value {} must not be negative", num))
                } else {
                    Ok(())
                }
            }),

            Constraint::MinLength(min_len) => {
                let len = length_of(value);
                if len < *min_len {
                    return Err(format!("Length {} is below minimum {}", len, min_len));
                }
                Ok(())
            }

            Constraint::MaxLength(max_len) => {
                let len = length_of(value);
                if len > *max_len {
                    return Err(format!("Length {} is above maximum {}", len, max_len));
                }
                Ok(())
            }

            Constraint::NotEmpty => {
                let is_empty = match value {
                    Value::String(s) => s.is_empty(),
                    Value::Array(arr) => arr.is_empty(),
                    Value::None => true,
                    _ => false,
                };
                if is_empty {
                    return Err("Value must not be empty".to_string());
                }
                Ok(())
            }

            Constraint::OneOf(options) => {
                if !options.contains(value) {
                    let names: Vec<String> = options.iter().map(|o| o.to_string()).collect();
                    return Err(format!(
                        "Value {} is not one of [{}]",
                        value,
                        names.join(", ")
                    ));
                }
                Ok(())
            }
        }
    }
}

fn each_number(value: &Value, check: &dyn Fn(f64) -> Result<(), String>) -> Result<(), String> {
    match value {
        Value::Array(arr) => arr.iter().try_for_each(|v| each_number(v, check)),
        other => match other.as_float() {
            Some(num) => check(num),
            None => Ok(()),
        },
    }
}

fn length_of(value: &Value) -> usize {
    match value {
        Value::String(s) => s.len(),
        Value::Array(arr) => arr.len(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::data::PixelType;

    #[test]
    fn test_slot_builder() {
        let slot = SlotDefinition::input("input_image", DataKind::Image(PixelType::U8))
            .with_description("Image to process")
            .optional();

        assert_eq!(slot.display_name, "Input Image");
        assert_eq!(slot.direction, SlotDirection::Input);
        assert!(slot.optional);
        assert!(slot.check_kind(DataKind::Image(PixelType::U8)).is_ok());
        assert!(slot.check_kind(DataKind::Summary).is_err());
    }

    #[test]
    fn test_parameter_validation() {
        let param = ParameterDefinition::new("radius", ValueType::Integer, Value::Integer(1))
            .with_constraint(Constraint::NonNegative);

        assert!(param.validate(&Value::Integer(3)).is_ok());
        assert!(param.validate(&Value::Integer(-1)).is_err());
        assert!(param.validate(&Value::String("3".to_string())).is_err());
    }

    #[test]
    fn test_array_constraints() {
        let param = ParameterDefinition::new(
            "size",
            ValueType::Array(Box::new(ValueType::Integer)),
            Value::from(vec![10i64, 10]),
        )
        .with_constraint(Constraint::Positive)
        .with_constraint(Constraint::NotEmpty);

        assert!(param.validate(&Value::from(vec![4i64, 8, 2])).is_ok());
        assert!(param.validate(&Value::from(vec![4i64, 0])).is_err());
        assert!(param.validate(&Value::Array(Vec::new())).is_err());
    }

    #[test]
    fn test_constraints_reach_nested_arrays() {
        let c = Constraint::NonNegative;
        let nested = Value::Array(vec![Value::from(vec![1i64, 2]), Value::from(vec![3i64])]);
        assert!(c.validate(&nested).is_ok());

        let nested = Value::Array(vec![Value::from(vec![1i64]), Value::from(vec![2i64, -4])]);
        let err = c.validate(&nested).unwrap_err();
        assert!(err.contains("-4"));

        let range = Constraint::Range { min: 0.0, max: 1.0 };
        assert!(range.validate(&Value::from(vec![0.5, 1.0])).is_ok());
        assert!(range.validate(&Value::from(vec![0.5, 1.5])).is_err());
    }

    #[test]
    fn test_one_of() {
        let c = Constraint::OneOf(vec![Value::from("ramp"), Value::from("constant")]);
        assert!(c.validate(&Value::from("ramp")).is_ok());
        let err = c.validate(&Value::from("noise")).unwrap_err();
        assert!(err.contains("ramp"));
    }
}
