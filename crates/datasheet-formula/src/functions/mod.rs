//! Built-in formula functions

pub mod array;
pub mod date;
pub mod info;
pub mod logical;
pub mod math;
pub mod text;

use std::sync::OnceLock;

use ahash::AHashMap;

use crate::context::EvaluationContext;
use crate::error::{ErrorKind, EvalError, EvalResult};
use crate::evaluator::Evaluator;
use crate::resolver::BoundNode;
use crate::value::Value;

/// Expected kind of one argument position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Passed through untouched
    Any,
    /// Pure number; dates do not convert
    Number,
    Text,
    Boolean,
    DateTime,
    /// Scalars are wrapped in a one-element array
    Array,
}

/// Eager implementation: arguments are evaluated and coerced first
pub type EagerImpl = fn(&[Value], &EvaluationContext<'_>) -> EvalResult<Value>;

/// Lazy implementation: receives the unevaluated argument nodes
pub type LazyImpl = fn(&mut Evaluator<'_>, &[BoundNode<'_>]) -> EvalResult<Value>;

#[derive(Clone, Copy)]
pub enum Implementation {
    Eager(EagerImpl),
    Lazy(LazyImpl),
}

/// Function definition
#[derive(Clone, Copy)]
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Expected kind per position; the last entry repeats for extra arguments
    pub params: &'static [ParamKind],
    pub implementation: Implementation,
    /// Reads the evaluation clock
    pub volatile: bool,
    /// Receives failed arguments as error values instead of propagating them
    pub error_tolerant: bool,
}

impl FunctionDef {
    pub const fn eager(
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        params: &'static [ParamKind],
        implementation: EagerImpl,
    ) -> Self {
        Self {
            name,
            min_args,
            max_args,
            params,
            implementation: Implementation::Eager(implementation),
            volatile: false,
            error_tolerant: false,
        }
    }

    pub const fn lazy(
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: LazyImpl,
    ) -> Self {
        Self {
            name,
            min_args,
            max_args,
            params: ANY,
            implementation: Implementation::Lazy(implementation),
            volatile: false,
            error_tolerant: false,
        }
    }

    pub const fn volatile(mut self) -> Self {
        self.volatile = true;
        self
    }

    pub const fn error_tolerant(mut self) -> Self {
        self.error_tolerant = true;
        self
    }

    /// Expected kind of argument `index`
    pub fn param(&self, index: usize) -> ParamKind {
        self.params
            .get(index)
            .or_else(|| self.params.last())
            .copied()
            .unwrap_or(ParamKind::Any)
    }

    /// Check the argument count against the declared bounds
    pub fn check_arity(&self, count: usize) -> EvalResult<()> {
        let too_few = count < self.min_args;
        let too_many = self.max_args.map_or(false, |max| count > max);
        if !(too_few || too_many) {
            return Ok(());
        }

        let expected = match self.max_args {
            Some(max) if max == self.min_args => format!("{}", max),
            Some(max) => format!("{} to {}", self.min_args, max),
            None => format!("at least {}", self.min_args),
        };
        Err(EvalError::new(
            ErrorKind::ArityMismatch,
            format!(
                "{} expects {} argument(s), got {}",
                self.name, expected, count
            ),
        ))
    }

    /// Coerce argument `index` to its declared kind
    pub fn coerce(&self, index: usize, value: Value) -> EvalResult<Value> {
        if self.error_tolerant && value.is_error() {
            return Ok(value);
        }

        let coerced = match self.param(index) {
            ParamKind::Any => value,
            ParamKind::Number => Value::Number(value.to_strict_number()?),
            ParamKind::Text => match value {
                Value::Error(e) => return Err(e),
                other => Value::String(other.to_text()),
            },
            ParamKind::Boolean => match value {
                Value::Error(e) => return Err(e),
                other => Value::Boolean(other.to_bool()),
            },
            ParamKind::DateTime => Value::DateTime(value.to_datetime()?),
            ParamKind::Array => match value {
                Value::Array(items) => Value::Array(items),
                Value::Blank => Value::Array(Vec::new()),
                Value::Error(e) => return Err(e),
                scalar => Value::Array(vec![scalar]),
            },
        };
        Ok(coerced)
    }
}

impl std::fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .field("params", &self.params)
            .field("volatile", &self.volatile)
            .field("error_tolerant", &self.error_tolerant)
            .finish()
    }
}

// Parameter lists shared by the registrations below
const ANY: &[ParamKind] = &[ParamKind::Any];
const NUM: &[ParamKind] = &[ParamKind::Number];
const NUM_NUM: &[ParamKind] = &[ParamKind::Number, ParamKind::Number];
const TEXT: &[ParamKind] = &[ParamKind::Text];
const TEXT_NUM: &[ParamKind] = &[ParamKind::Text, ParamKind::Number];
const TEXT_NUM_NUM: &[ParamKind] = &[ParamKind::Text, ParamKind::Number, ParamKind::Number];
const TEXT_TEXT_NUM: &[ParamKind] = &[ParamKind::Text, ParamKind::Text, ParamKind::Number];
const REPLACE: &[ParamKind] = &[
    ParamKind::Text,
    ParamKind::Number,
    ParamKind::Number,
    ParamKind::Text,
];
const SUBSTITUTE: &[ParamKind] = &[
    ParamKind::Text,
    ParamKind::Text,
    ParamKind::Text,
    ParamKind::Number,
];
const BOOL: &[ParamKind] = &[ParamKind::Boolean];
const NONE: &[ParamKind] = &[];
const DATE: &[ParamKind] = &[ParamKind::DateTime];
const DATE_TEXT: &[ParamKind] = &[ParamKind::DateTime, ParamKind::Text];
const DATE_DATE: &[ParamKind] = &[ParamKind::DateTime, ParamKind::DateTime];
const DATE_DATE_TEXT: &[ParamKind] = &[ParamKind::DateTime, ParamKind::DateTime, ParamKind::Text];
const DATE_NUM_TEXT: &[ParamKind] = &[ParamKind::DateTime, ParamKind::Number, ParamKind::Text];
const ARRAY: &[ParamKind] = &[ParamKind::Array];
const ARRAY_TEXT: &[ParamKind] = &[ParamKind::Array, ParamKind::Text];

/// Function registry
pub struct FunctionRegistry {
    functions: AHashMap<&'static str, FunctionDef>,
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: AHashMap::new(),
        };

        registry.register_math_functions();
        registry.register_text_functions();
        registry.register_date_functions();
        registry.register_logical_functions();
        registry.register_info_functions();
        registry.register_array_functions();

        registry
    }

    /// Look up a function by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name.to_uppercase().as_str())
    }

    /// Register a function
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name, def);
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn register_math_functions(&mut self) {
        self.register(FunctionDef::eager("SUM", 1, None, ANY, math::fn_sum));
        self.register(FunctionDef::eager("AVERAGE", 1, None, ANY, math::fn_average));
        self.register(FunctionDef::eager("MAX", 1, None, ANY, math::fn_max));
        self.register(FunctionDef::eager("MIN", 1, None, ANY, math::fn_min));
        self.register(FunctionDef::eager("ROUND", 1, Some(2), NUM_NUM, math::fn_round));
        self.register(FunctionDef::eager("ROUNDUP", 1, Some(2), NUM_NUM, math::fn_roundup));
        self.register(FunctionDef::eager(
            "ROUNDDOWN",
            1,
            Some(2),
            NUM_NUM,
            math::fn_rounddown,
        ));
        self.register(FunctionDef::eager("ABS", 1, Some(1), NUM, math::fn_abs));
        self.register(FunctionDef::eager("MOD", 2, Some(2), NUM_NUM, math::fn_mod));
        self.register(FunctionDef::eager("POWER", 2, Some(2), NUM_NUM, math::fn_power));
        self.register(FunctionDef::eager("INT", 1, Some(1), NUM, math::fn_int));
        self.register(FunctionDef::eager("SQRT", 1, Some(1), NUM, math::fn_sqrt));
        self.register(FunctionDef::eager("VALUE", 1, Some(1), TEXT, math::fn_value));
    }

    fn register_text_functions(&mut self) {
        self.register(FunctionDef::eager(
            "CONCATENATE",
            1,
            None,
            TEXT,
            text::fn_concatenate,
        ));
        self.register(FunctionDef::eager("LEFT", 1, Some(2), TEXT_NUM, text::fn_left));
        self.register(FunctionDef::eager("RIGHT", 1, Some(2), TEXT_NUM, text::fn_right));
        self.register(FunctionDef::eager("MID", 3, Some(3), TEXT_NUM_NUM, text::fn_mid));
        self.register(FunctionDef::eager("LEN", 1, Some(1), TEXT, text::fn_len));
        self.register(FunctionDef::eager("FIND", 2, Some(3), TEXT_TEXT_NUM, text::fn_find));
        self.register(FunctionDef::eager(
            "SEARCH",
            2,
            Some(3),
            TEXT_TEXT_NUM,
            text::fn_search,
        ));
        self.register(FunctionDef::eager("TRIM", 1, Some(1), TEXT, text::fn_trim));
        self.register(FunctionDef::eager("UPPER", 1, Some(1), TEXT, text::fn_upper));
        self.register(FunctionDef::eager("LOWER", 1, Some(1), TEXT, text::fn_lower));
        self.register(FunctionDef::eager("REPLACE", 4, Some(4), REPLACE, text::fn_replace));
        self.register(FunctionDef::eager(
            "SUBSTITUTE",
            3,
            Some(4),
            SUBSTITUTE,
            text::fn_substitute,
        ));
        self.register(FunctionDef::eager("REPT", 2, Some(2), TEXT_NUM, text::fn_rept));
        self.register(FunctionDef::eager("T", 1, Some(1), ANY, text::fn_t));
    }

    fn register_date_functions(&mut self) {
        self.register(FunctionDef::eager("TODAY", 0, Some(0), NONE, date::fn_today).volatile());
        self.register(FunctionDef::eager("NOW", 0, Some(0), NONE, date::fn_now).volatile());
        self.register(FunctionDef::eager(
            "DATEADD",
            3,
            Some(3),
            DATE_NUM_TEXT,
            date::fn_dateadd,
        ));
        self.register(FunctionDef::eager(
            "DATEDIF",
            2,
            Some(3),
            DATE_DATE_TEXT,
            date::fn_datedif,
        ));
        self.register(FunctionDef::eager("YEAR", 1, Some(1), DATE, date::fn_year));
        self.register(FunctionDef::eager("MONTH", 1, Some(1), DATE, date::fn_month));
        self.register(FunctionDef::eager("DAY", 1, Some(1), DATE, date::fn_day));
        self.register(FunctionDef::eager("HOUR", 1, Some(1), DATE, date::fn_hour));
        self.register(FunctionDef::eager("MINUTE", 1, Some(1), DATE, date::fn_minute));
        self.register(FunctionDef::eager("SECOND", 1, Some(1), DATE, date::fn_second));
        self.register(FunctionDef::eager("WEEKDAY", 1, Some(1), DATE, date::fn_weekday));
        self.register(FunctionDef::eager(
            "DATETIME_FORMAT",
            1,
            Some(2),
            DATE_TEXT,
            date::fn_datetime_format,
        ));
        self.register(FunctionDef::eager("DATESTR", 1, Some(1), DATE, date::fn_datestr));
        self.register(FunctionDef::eager(
            "IS_BEFORE",
            2,
            Some(2),
            DATE_DATE,
            date::fn_is_before,
        ));
        self.register(FunctionDef::eager(
            "IS_AFTER",
            2,
            Some(2),
            DATE_DATE,
            date::fn_is_after,
        ));
    }

    fn register_logical_functions(&mut self) {
        // Branches are only evaluated when taken
        self.register(FunctionDef::lazy("IF", 2, Some(3), logical::fn_if));
        self.register(FunctionDef::lazy("SWITCH", 3, None, logical::fn_switch));
        self.register(FunctionDef::lazy("IFERROR", 2, Some(2), logical::fn_iferror));

        self.register(FunctionDef::eager("AND", 1, None, ANY, logical::fn_and));
        self.register(FunctionDef::eager("OR", 1, None, ANY, logical::fn_or));
        self.register(FunctionDef::eager("XOR", 1, None, ANY, logical::fn_xor));
        self.register(FunctionDef::eager("NOT", 1, Some(1), BOOL, logical::fn_not));
        self.register(FunctionDef::eager("TRUE", 0, Some(0), NONE, logical::fn_true));
        self.register(FunctionDef::eager("FALSE", 0, Some(0), NONE, logical::fn_false));
    }

    fn register_info_functions(&mut self) {
        self.register(
            FunctionDef::eager("ISERROR", 1, Some(1), ANY, info::fn_iserror).error_tolerant(),
        );
        self.register(FunctionDef::eager("BLANK", 0, Some(0), NONE, info::fn_blank));
    }

    fn register_array_functions(&mut self) {
        self.register(FunctionDef::eager("COUNT", 1, None, ANY, array::fn_count));
        self.register(FunctionDef::eager("COUNTA", 1, None, ANY, array::fn_counta));
        self.register(FunctionDef::eager("COUNTALL", 1, None, ANY, array::fn_countall));
        self.register(FunctionDef::eager(
            "ARRAYJOIN",
            1,
            Some(2),
            ARRAY_TEXT,
            array::fn_arrayjoin,
        ));
        self.register(FunctionDef::eager(
            "ARRAYUNIQUE",
            1,
            Some(1),
            ARRAY,
            array::fn_arrayunique,
        ));
        self.register(FunctionDef::eager(
            "ARRAYCOMPACT",
            1,
            Some(1),
            ARRAY,
            array::fn_arraycompact,
        ));
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global function registry (lazily initialized)
static FUNCTION_REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();

/// The built-in function registry
pub fn get_function_registry() -> &'static FunctionRegistry {
    FUNCTION_REGISTRY.get_or_init(FunctionRegistry::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = get_function_registry();
        assert!(registry.get("sum").is_some());
        assert!(registry.get("Concatenate").is_some());
        assert!(registry.get("VLOOKUP").is_none());
    }

    #[test]
    fn test_required_families_registered() {
        let registry = get_function_registry();
        for name in [
            "SUM", "ROUND", "ABS", "MOD", "POWER", "CONCATENATE", "LEFT", "RIGHT", "MID", "LEN",
            "FIND", "TRIM", "UPPER", "LOWER", "REPLACE", "TODAY", "NOW", "DATEADD", "DATEDIF",
            "YEAR", "MONTH", "DAY", "DATETIME_FORMAT", "IF", "AND", "OR", "NOT", "XOR", "SWITCH",
            "COUNT", "COUNTA", "ARRAYJOIN", "ISERROR", "BLANK",
        ] {
            assert!(registry.get(name).is_some(), "{} missing", name);
        }
    }

    #[test]
    fn test_volatile_flags() {
        let registry = get_function_registry();
        assert!(registry.get("NOW").unwrap().volatile);
        assert!(registry.get("TODAY").unwrap().volatile);
        assert!(!registry.get("SUM").unwrap().volatile);
    }

    #[test]
    fn test_arity_messages() {
        let round = get_function_registry().get("ROUND").unwrap();
        assert!(round.check_arity(1).is_ok());
        let err = round.check_arity(3).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ArityMismatch);
        assert_eq!(err.message, "ROUND expects 1 to 2 argument(s), got 3");
    }

    #[test]
    fn test_param_kind_repeats_last() {
        let def = get_function_registry().get("CONCATENATE").unwrap();
        assert_eq!(def.param(0), ParamKind::Text);
        assert_eq!(def.param(5), ParamKind::Text);
        let today = get_function_registry().get("TODAY").unwrap();
        assert_eq!(today.param(0), ParamKind::Any);
    }

    #[test]
    fn test_coerce() {
        let def = get_function_registry().get("ABS").unwrap();
        assert_eq!(def.coerce(0, Value::from("-3")), Ok(Value::Number(-3.0)));
        assert_eq!(
            def.coerce(0, Value::from("x")).unwrap_err().kind,
            ErrorKind::NotANumber
        );

        let join = get_function_registry().get("ARRAYJOIN").unwrap();
        assert_eq!(
            join.coerce(0, Value::from("solo")),
            Ok(Value::Array(vec![Value::from("solo")]))
        );
    }
}
