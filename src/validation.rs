//! Request payload schemas and the validate-then-report pipeline.
//!
//! Every schema is a plain struct deriving [`Validate`] plus a [`Schema`]
//! table of its payload fields. [`validate_request`] turns an untyped JSON
//! value into the typed schema or into a [`ValidationFailure`] listing every
//! violation as `"<dotted.path>: <message>"`, in field declaration order.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

/// Canonical hyphenated UUID, any version.
pub static UUID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("uuid pattern is a valid regex")
});

/// Failed validation: one entry per violated constraint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", .errors.join(", "))]
pub struct ValidationFailure {
    pub errors: Vec<String>,
}

impl ValidationFailure {
    pub fn new(errors: Vec<String>) -> Self {
        Self { errors }
    }
}

impl From<&ValidationErrors> for ValidationFailure {
    fn from(errors: &ValidationErrors) -> Self {
        let mut messages = Vec::new();
        collect_messages(errors, "", &mut messages);
        Self::new(messages)
    }
}

const REQUIRED: &str = "Required";

/// JSON type a schema field expects.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Array(&'static FieldKind),
    Object(&'static [FieldSpec]),
}

impl FieldKind {
    fn name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Array(_) => "array",
            FieldKind::Object(_) => "object",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (FieldKind::String, Value::String(_))
                | (FieldKind::Number, Value::Number(_))
                | (FieldKind::Boolean, Value::Bool(_))
                | (FieldKind::Array(_), Value::Array(_))
                | (FieldKind::Object(_), Value::Object(_))
        )
    }

    /// Stand-in that deserializes cleanly once a bad value has been reported.
    fn placeholder(&self) -> Value {
        match self {
            FieldKind::String => Value::String(String::new()),
            FieldKind::Number => Value::from(0),
            FieldKind::Boolean => Value::Bool(false),
            FieldKind::Array(_) => Value::Array(Vec::new()),
            FieldKind::Object(fields) => {
                let mut map = Map::new();
                for field in fields.iter().filter(|f| f.missing.is_some()) {
                    map.insert(field.name.to_string(), field.kind.placeholder());
                }
                Value::Object(map)
            }
        }
    }
}

/// One payload field, listed in the order its errors are reported.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Payload key.
    pub name: &'static str,
    /// Struct field name, the key `validator` reports under.
    pub key: &'static str,
    pub kind: FieldKind,
    /// Message when the field is absent; `None` for optional fields.
    pub missing: Option<&'static str>,
    /// Validator codes in reporting order.
    pub checks: &'static [&'static str],
}

impl FieldSpec {
    pub const fn required(
        name: &'static str,
        key: &'static str,
        kind: FieldKind,
        checks: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            key,
            kind,
            missing: Some(REQUIRED),
            checks,
        }
    }

    pub const fn optional(
        name: &'static str,
        key: &'static str,
        kind: FieldKind,
        checks: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            key,
            kind,
            missing: None,
            checks,
        }
    }

    pub const fn missing_message(self, message: &'static str) -> Self {
        Self {
            missing: Some(message),
            ..self
        }
    }

    fn rank(&self, code: &str) -> usize {
        self.checks
            .iter()
            .position(|check| *check == code)
            .unwrap_or(self.checks.len())
    }
}

/// A request payload with a declared field layout.
pub trait Schema: DeserializeOwned + Validate {
    const FIELDS: &'static [FieldSpec];
}

/// Parse `input` into `T` and check every constraint declared on it.
///
/// Fields are checked in declaration order. A missing or mistyped field
/// reports its shape error; every other field still reports its constraint
/// violations.
pub fn validate_request<T: Schema>(input: Value) -> Result<T, ValidationFailure> {
    let mut object = match input {
        Value::Object(map) => map,
        other => {
            return Err(ValidationFailure::new(vec![format!(
                "Expected object, received {}",
                type_name(&other)
            )]))
        }
    };

    let mut broken = BTreeMap::new();
    check_shape(T::FIELDS, &mut object, "", &mut broken);

    let data: T = match serde_json::from_value(Value::Object(object.clone())) {
        Ok(data) => data,
        Err(err) => {
            let mut errors: Vec<String> = broken
                .iter()
                .map(|(path, message)| format!("{}: {}", path, message))
                .collect();
            errors.push(err.to_string());
            return Err(ValidationFailure::new(errors));
        }
    };

    let checked = data.validate();
    if broken.is_empty() && checked.is_ok() {
        return Ok(data);
    }

    let mut errors = Vec::new();
    report(
        T::FIELDS,
        Some(&object),
        checked.as_ref().err(),
        "",
        &broken,
        &mut errors,
    );
    if errors.is_empty() {
        if let Err(violations) = &checked {
            errors = ValidationFailure::from(violations).errors;
        }
    }
    Err(ValidationFailure::new(errors))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(kind: &FieldKind, value: &Value) -> String {
    format!("Expected {}, received {}", kind.name(), type_name(value))
}

/// Record missing and mistyped fields under their path, swapping in
/// placeholders so the rest of the payload still deserializes.
fn check_shape(
    fields: &[FieldSpec],
    object: &mut Map<String, Value>,
    prefix: &str,
    broken: &mut BTreeMap<String, String>,
) {
    for field in fields {
        let path = join_path(prefix, field.name);
        let problem = match object.get_mut(field.name) {
            None => field.missing.map(str::to_string),
            Some(value) if field.kind.matches(value) => {
                check_children(&field.kind, value, &path, broken);
                None
            }
            Some(value) => Some(mismatch(&field.kind, value)),
        };

        if let Some(message) = problem {
            broken.insert(path, message);
            if field.missing.is_some() {
                object.insert(field.name.to_string(), field.kind.placeholder());
            } else {
                object.remove(field.name);
            }
        }
    }
}

fn check_children(
    kind: &FieldKind,
    value: &mut Value,
    path: &str,
    broken: &mut BTreeMap<String, String>,
) {
    match (kind, value) {
        (FieldKind::Object(fields), Value::Object(map)) => check_shape(fields, map, path, broken),
        (FieldKind::Array(element), Value::Array(items)) => {
            for (index, item) in items.iter_mut().enumerate() {
                let item_path = format!("{}.{}", path, index);
                if element.matches(item) {
                    check_children(element, item, &item_path, broken);
                } else {
                    broken.insert(item_path, mismatch(element, item));
                    *item = element.placeholder();
                }
            }
        }
        _ => {}
    }
}

/// Emit shape errors and validator messages in declaration order.
fn report(
    fields: &[FieldSpec],
    object: Option<&Map<String, Value>>,
    errors: Option<&ValidationErrors>,
    prefix: &str,
    broken: &BTreeMap<String, String>,
    out: &mut Vec<String>,
) {
    for field in fields {
        let path = join_path(prefix, field.name);
        if let Some(message) = broken.get(&path) {
            out.push(format!("{}: {}", path, message));
            continue;
        }

        // Placeholders inside a mistyped list would trip its own checks.
        let inner_prefix = format!("{}.", path);
        let contents_broken = broken.keys().any(|key| key.starts_with(&inner_prefix));

        let found = errors.and_then(|errors| errors.errors().get(field.key));
        if let (Some(ValidationErrorsKind::Field(errs)), false) = (found, contents_broken) {
            let mut errs: Vec<&ValidationError> = errs.iter().collect();
            errs.sort_by_key(|err| field.rank(&err.code));
            for err in errs {
                out.push(format!("{}: {}", path, message_of(err)));
            }
        }

        let value = object.and_then(|object| object.get(field.name));
        report_children(&field.kind, value, found, &path, broken, out);
    }
}

fn report_children(
    kind: &FieldKind,
    value: Option<&Value>,
    errors: Option<&ValidationErrorsKind>,
    path: &str,
    broken: &BTreeMap<String, String>,
    out: &mut Vec<String>,
) {
    match (kind, value) {
        (FieldKind::Object(fields), Some(Value::Object(map))) => {
            let nested = match errors {
                Some(ValidationErrorsKind::Struct(inner)) => Some(inner.as_ref()),
                _ => None,
            };
            report(fields, Some(map), nested, path, broken, out);
        }
        (FieldKind::Array(element), Some(Value::Array(items))) => {
            for (index, item) in items.iter().enumerate() {
                let item_path = format!("{}.{}", path, index);
                if let Some(message) = broken.get(&item_path) {
                    out.push(format!("{}: {}", item_path, message));
                    continue;
                }
                let nested = match errors {
                    Some(ValidationErrorsKind::List(list)) => {
                        list.get(&index).map(|inner| inner.as_ref())
                    }
                    _ => None,
                };
                if let (FieldKind::Object(fields), Value::Object(map)) = (*element, item) {
                    report(fields, Some(map), nested, &item_path, broken, out);
                }
            }
        }
        _ => {}
    }
}

/// Flatten errors without a field layout; keys are sorted for a stable order.
fn collect_messages(errors: &ValidationErrors, prefix: &str, out: &mut Vec<String>) {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in fields {
        let path = join_path(prefix, &camel_case(field));
        match kind {
            ValidationErrorsKind::Field(errs) => {
                for err in errs {
                    out.push(format!("{}: {}", path, message_of(err)));
                }
            }
            ValidationErrorsKind::Struct(inner) => collect_messages(inner, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_messages(inner, &format!("{}.{}", path, index), out);
                }
            }
        }
    }
}

fn message_of(err: &ValidationError) -> Cow<'_, str> {
    match &err.message {
        Some(message) => Cow::Borrowed(message.as_ref()),
        None => Cow::Owned(format!("Invalid value ({})", err.code)),
    }
}

fn join_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", prefix, field)
    }
}

/// Field keys come from Rust identifiers; payloads use camelCase.
fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn bounded_text(
    value: &str,
    max: usize,
    required: &'static str,
    too_long: &'static str,
) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len == 0 {
        return Err(ValidationError::new("length").with_message(Cow::Borrowed(required)));
    }
    if len > max {
        return Err(ValidationError::new("length").with_message(Cow::Borrowed(too_long)));
    }
    Ok(())
}

fn name_text(value: &str) -> Result<(), ValidationError> {
    bounded_text(value, 255, "Name is required", "Name too long")
}

fn store_name_text(value: &str) -> Result<(), ValidationError> {
    bounded_text(value, 255, "Store name is required", "Store name too long")
}

fn label_text(value: &str) -> Result<(), ValidationError> {
    bounded_text(value, 255, "Label is required", "Label too long")
}

fn color_value_text(value: &str) -> Result<(), ValidationError> {
    bounded_text(value, 7, "Value is required", "Invalid color value")
}

fn size_value_text(value: &str) -> Result<(), ValidationError> {
    bounded_text(value, 50, "Value is required", "Value too long")
}

fn positive_price(value: f64) -> Result<(), ValidationError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::new("positive").with_message(Cow::Borrowed("Price must be positive")))
    }
}

fn product_id_list(ids: &[String]) -> Result<(), ValidationError> {
    if ids.is_empty() {
        return Err(ValidationError::new("length")
            .with_message(Cow::Borrowed("Product ids are required")));
    }
    if ids.iter().any(|id| !UUID_REGEX.is_match(id)) {
        return Err(ValidationError::new("uuid")
            .with_message(Cow::Borrowed("Invalid product ID format")));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StoreIdParams {
    #[validate(regex(path = *UUID_REGEX, message = "Invalid store ID format"))]
    pub store_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StoreInput {
    #[validate(custom(function = "store_name_text"))]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ImageInput {
    #[validate(url(message = "Invalid image URL"))]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    #[validate(custom(function = "name_text"))]
    pub name: String,
    #[validate(
        custom(function = "positive_price"),
        range(min = 0.01, message = "Price must be at least 0.01")
    )]
    pub price: f64,
    #[validate(regex(path = *UUID_REGEX, message = "Invalid category ID format"))]
    pub category_id: String,
    #[validate(regex(path = *UUID_REGEX, message = "Invalid color ID format"))]
    pub color_id: String,
    #[validate(regex(path = *UUID_REGEX, message = "Invalid size ID format"))]
    pub size_id: String,
    #[validate(length(min = 1, message = "At least one image is required"), nested)]
    pub images: Vec<ImageInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_featured: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_archived: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInput {
    #[validate(custom(function = "name_text"))]
    pub name: String,
    #[validate(regex(path = *UUID_REGEX, message = "Invalid billboard ID format"))]
    pub billboard_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BillboardInput {
    #[validate(custom(function = "label_text"))]
    pub label: String,
    #[validate(url(message = "Invalid image URL"))]
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ColorInput {
    #[validate(custom(function = "name_text"))]
    pub name: String,
    #[validate(custom(function = "color_value_text"))]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SizeInput {
    #[validate(custom(function = "name_text"))]
    pub name: String,
    #[validate(custom(function = "size_value_text"))]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutInput {
    #[validate(custom(function = "product_id_list"))]
    pub product_ids: Vec<String>,
    #[validate(nested)]
    pub customer_info: CustomerInfo,
}

const TEXT: &[&str] = &["length"];
const ID: &[&str] = &["regex"];
const URL: &[&str] = &["url"];

const STRING: FieldKind = FieldKind::String;
const IMAGE: FieldKind = FieldKind::Object(ImageInput::FIELDS);
const CUSTOMER: FieldKind = FieldKind::Object(CustomerInfo::FIELDS);

impl Schema for StoreIdParams {
    const FIELDS: &'static [FieldSpec] =
        &[FieldSpec::required("storeId", "store_id", FieldKind::String, ID)];
}

impl Schema for StoreInput {
    const FIELDS: &'static [FieldSpec] =
        &[FieldSpec::required("name", "name", FieldKind::String, TEXT)];
}

impl Schema for ImageInput {
    const FIELDS: &'static [FieldSpec] =
        &[FieldSpec::required("url", "url", FieldKind::String, URL)];
}

impl Schema for ProductInput {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("name", "name", FieldKind::String, TEXT),
        FieldSpec::required("price", "price", FieldKind::Number, &["positive", "range"]),
        FieldSpec::required("categoryId", "category_id", FieldKind::String, ID),
        FieldSpec::required("colorId", "color_id", FieldKind::String, ID),
        FieldSpec::required("sizeId", "size_id", FieldKind::String, ID),
        FieldSpec::required("images", "images", FieldKind::Array(&IMAGE), &["length"]),
        FieldSpec::optional("isFeatured", "is_featured", FieldKind::Boolean, &[]),
        FieldSpec::optional("isArchived", "is_archived", FieldKind::Boolean, &[]),
    ];
}

impl Schema for CategoryInput {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("name", "name", FieldKind::String, TEXT),
        FieldSpec::required("billboardId", "billboard_id", FieldKind::String, ID),
    ];
}

impl Schema for BillboardInput {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("label", "label", FieldKind::String, TEXT),
        FieldSpec::required("imageUrl", "image_url", FieldKind::String, URL),
    ];
}

impl Schema for ColorInput {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("name", "name", FieldKind::String, TEXT),
        FieldSpec::required("value", "value", FieldKind::String, TEXT),
    ];
}

impl Schema for SizeInput {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("name", "name", FieldKind::String, TEXT),
        FieldSpec::required("value", "value", FieldKind::String, TEXT),
    ];
}

impl Schema for CustomerInfo {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::optional("name", "name", FieldKind::String, &[]),
        FieldSpec::optional("email", "email", FieldKind::String, &["email"]),
        FieldSpec::optional("phone", "phone", FieldKind::String, &[]),
        FieldSpec::optional("address", "address", FieldKind::String, &[]),
    ];
}

impl Schema for CheckoutInput {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required(
            "productIds",
            "product_ids",
            FieldKind::Array(&STRING),
            &["length", "uuid"],
        )
        .missing_message("Product ids are required"),
        FieldSpec::required("customerInfo", "customer_info", CUSTOMER, &[])
            .missing_message("Customer information is required"),
    ];
}
