//! Named, typed configuration fields handed over by the host when it creates
//! a plugin, and typed getters over them.
use roialign_core::internal::*;

use std::fmt::{self, Debug, Display};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Int8,
    Int32,
    Float32,
    Char,
}

impl Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            FieldType::Int8 => "int8",
            FieldType::Int32 => "int32",
            FieldType::Float32 => "float32",
            FieldType::Char => "string",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int8(Vec<i8>),
    Int32(Vec<i32>),
    Float32(Vec<f32>),
    Char(String),
}

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Int8(_) => FieldType::Int8,
            FieldValue::Int32(_) => FieldType::Int32,
            FieldValue::Float32(_) => FieldType::Float32,
            FieldValue::Char(_) => FieldType::Char,
        }
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> FieldValue {
        FieldValue::Int32(vec![v])
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> FieldValue {
        FieldValue::Float32(vec![v])
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> FieldValue {
        FieldValue::Int8(vec![v as i8])
    }
}

#[derive(Debug, Clone, PartialEq, new)]
pub struct PluginField {
    pub name: String,
    pub value: FieldValue,
}

/// Declaration of a field a creator understands.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: &'static str,
    pub field_type: FieldType,
    pub required: bool,
}

pub trait Reason {
    fn reason(&self) -> Cow<'_, str>;
}

impl Reason for &str {
    fn reason(&self) -> Cow<'_, str> {
        (*self).into()
    }
}

impl<F> Reason for F
where
    F: Fn() -> String,
{
    fn reason(&self) -> Cow<'_, str> {
        self().into()
    }
}

pub trait OptionExt {
    type Item;

    fn and_try<F, T>(self, f: F) -> RoiResult<Option<T>>
    where
        F: Fn(Self::Item) -> RoiResult<T>;
}

impl<A> OptionExt for Option<A> {
    type Item = A;

    fn and_try<F, T>(self, f: F) -> RoiResult<Option<T>>
    where
        F: Fn(Self::Item) -> RoiResult<T>,
    {
        match self {
            Some(attr) => f(attr).map(Some),
            None => Ok(None),
        }
    }
}

pub trait FieldScalarType<'a>: 'a + Sized {
    fn get_field_opt_scalar(fc: &'a FieldCollection, name: &str) -> RoiResult<Option<Self>>;
}

impl<'a> FieldScalarType<'a> for i32 {
    fn get_field_opt_scalar(fc: &'a FieldCollection, name: &str) -> RoiResult<Option<Self>> {
        match fc.field(name) {
            None => Ok(None),
            Some(FieldValue::Int32(v)) => fc.single(name, v).map(Some),
            Some(FieldValue::Int8(v)) => fc.single(name, v).map(|v| Some(v as i32)),
            Some(other) => fc.bail_field(name, &format!("expected int32, got {}", other.field_type())),
        }
    }
}

impl<'a> FieldScalarType<'a> for usize {
    fn get_field_opt_scalar(fc: &'a FieldCollection, name: &str) -> RoiResult<Option<Self>> {
        let int: Option<i32> = FieldScalarType::get_field_opt_scalar(fc, name)?;
        int.and_try(|int| {
            fc.expect_field(name, int >= 1, || format!("positive int, got {int}"))?;
            Ok(int as usize)
        })
    }
}

impl<'a> FieldScalarType<'a> for bool {
    fn get_field_opt_scalar(fc: &'a FieldCollection, name: &str) -> RoiResult<Option<Self>> {
        let int: Option<i32> = FieldScalarType::get_field_opt_scalar(fc, name)?;
        int.and_try(|int| {
            fc.expect_field(name, int == 0 || int == 1, || format!("boolean (0 or 1), got {int}"))?;
            Ok(int == 1)
        })
    }
}

impl<'a> FieldScalarType<'a> for f32 {
    fn get_field_opt_scalar(fc: &'a FieldCollection, name: &str) -> RoiResult<Option<Self>> {
        match fc.field(name) {
            None => Ok(None),
            Some(FieldValue::Float32(v)) => fc.single(name, v).map(Some),
            Some(other) => {
                fc.bail_field(name, &format!("expected float32, got {}", other.field_type()))
            }
        }
    }
}

/// The bag of fields a plugin is created from.
///
/// When a name appears several times, the last occurrence wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldCollection {
    pub fields: Vec<PluginField>,
}

impl FieldCollection {
    pub fn new() -> FieldCollection {
        FieldCollection::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.push(PluginField::new(name.into(), value.into()));
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().rev().find(|f| f.name == name).map(|f| &f.value)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn bail_field<T>(&self, field: &str, msg: &str) -> RoiResult<T> {
        Err(RoiAlignError::configuration(format!("field '{field}': {msg}")).into())
    }

    pub fn expect_field<R: Reason>(&self, field: &str, cond: bool, what: R) -> RoiResult<()> {
        if !cond { self.bail_field(field, &format!("expected {}", what.reason())) } else { Ok(()) }
    }

    fn single<T: Copy + Debug>(&self, name: &str, values: &[T]) -> RoiResult<T> {
        match values {
            [v] => Ok(*v),
            _ => self.bail_field(name, &format!("expected a single value, got {values:?}")),
        }
    }

    pub fn get_field_opt<'a, T>(&'a self, name: &str) -> RoiResult<Option<T>>
    where
        T: FieldScalarType<'a>,
    {
        T::get_field_opt_scalar(self, name)
    }

    pub fn get_field<'a, T>(&'a self, name: &str) -> RoiResult<T>
    where
        T: FieldScalarType<'a>,
    {
        match self.get_field_opt(name)? {
            Some(v) => Ok(v),
            None => self.bail_field(name, "required field is missing"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn kind(err: &anyhow::Error) -> Option<&RoiAlignError> {
        error_kind(err)
    }

    #[test]
    fn typed_access() {
        let fc = FieldCollection::new()
            .with("h", 7)
            .with("scale", 0.25f32)
            .with("flag", true)
            .with("flag_i", 1);
        assert_eq!(fc.get_field::<i32>("h").unwrap(), 7);
        assert_eq!(fc.get_field::<usize>("h").unwrap(), 7);
        assert_eq!(fc.get_field::<f32>("scale").unwrap(), 0.25);
        assert!(fc.get_field::<bool>("flag").unwrap());
        assert!(fc.get_field::<bool>("flag_i").unwrap());
        assert_eq!(fc.get_field_opt::<i32>("missing").unwrap(), None);
    }

    #[test]
    fn errors_name_the_field() {
        let fc = FieldCollection::new().with("h", 0.5f32).with("n", -1).with("b", 2);
        let err = fc.get_field::<i32>("h").unwrap_err();
        assert!(matches!(kind(&err), Some(RoiAlignError::Configuration(_))));
        assert!(err.to_string().contains("'h'"));
        assert!(err.to_string().contains("float32"));
        assert!(fc.get_field::<usize>("n").is_err());
        assert!(fc.get_field::<bool>("b").is_err());
        let err = fc.get_field::<f32>("missing").unwrap_err();
        assert!(err.to_string().contains("'missing'"));
    }

    #[test]
    fn last_occurrence_wins() {
        let fc = FieldCollection::new().with("h", 3).with("h", 4);
        assert_eq!(fc.get_field::<i32>("h").unwrap(), 4);
        assert_eq!(fc.fields.len(), 2);
    }

    #[test]
    fn multi_valued_scalars_are_refused() {
        let fc = FieldCollection {
            fields: vec![PluginField::new("h".into(), FieldValue::Int32(vec![1, 2]))],
        };
        assert!(fc.get_field::<i32>("h").is_err());
    }
}
