//! Parameter slots and binding.
//!
//! A statement holds one [`ParamSlot`] per placeholder. The compiler fixes
//! each slot's declared type; EXECUTE binds a value to every slot and
//! derives the kind of value actually supplied, which [`compat::check`]
//! compares against the declaration.

pub mod compat;
pub mod numeric;

use bytes::{Bytes, BytesMut};
use nexus_common::{Condition, ErrorCode};
use nexus_wire::{FieldType, Temporal, Value};
use tracing::trace;

use crate::backend::ParamDeclaration;
use crate::error::{StmtError, StmtResult};
use crate::types::{ActualKind, SqlType};

pub use compat::Compatibility;
pub use numeric::{NumericKind, NumericParse};

/// What to do with values beyond the placeholder count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurplusPolicy {
    /// Drop trailing extras (binary protocol EXECUTE).
    #[default]
    Ignore,
    /// Any count difference is an error (SQL-level EXECUTE ... USING).
    Reject,
}

/// One parameter value as sent by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamInput {
    /// Wire type the client bound.
    pub field_type: FieldType,
    /// Unsigned flag.
    pub unsigned: bool,
    /// Encoded value; `None` is NULL.
    pub raw: Option<Bytes>,
}

impl ParamInput {
    /// Creates an input from an encoded value.
    pub fn new(field_type: FieldType, unsigned: bool, raw: impl Into<Bytes>) -> Self {
        Self {
            field_type,
            unsigned,
            raw: Some(raw.into()),
        }
    }

    /// NULL.
    #[must_use]
    pub fn null() -> Self {
        Self {
            field_type: FieldType::Null,
            unsigned: false,
            raw: None,
        }
    }

    /// Signed 8-byte integer.
    #[must_use]
    pub fn int(value: i64) -> Self {
        Self::new(FieldType::LongLong, false, value.to_le_bytes().to_vec())
    }

    /// Signed 4-byte integer.
    #[must_use]
    pub fn long(value: i32) -> Self {
        Self::new(FieldType::Long, false, value.to_le_bytes().to_vec())
    }

    /// Unsigned 8-byte integer.
    #[must_use]
    pub fn uint(value: u64) -> Self {
        Self::new(FieldType::LongLong, true, value.to_le_bytes().to_vec())
    }

    /// Double.
    #[must_use]
    pub fn double(value: f64) -> Self {
        Self::new(FieldType::Double, false, value.to_le_bytes().to_vec())
    }

    /// Character string.
    #[must_use]
    pub fn text(value: &str) -> Self {
        Self::new(
            FieldType::VarString,
            false,
            Bytes::copy_from_slice(value.as_bytes()),
        )
    }

    /// Encodes a value using its natural wire type.
    pub fn from_value(value: &Value) -> nexus_wire::WireResult<Self> {
        if value.is_null() {
            return Ok(Self::null());
        }
        let (field_type, unsigned) = nexus_wire::natural_type(value);
        let raw = nexus_wire::encode_to_bytes(field_type, unsigned, value)?;
        Ok(Self::new(field_type, unsigned, raw))
    }
}

// =============================================================================
// ParamSlot
// =============================================================================

/// Per-placeholder type and value state.
#[derive(Debug, Clone)]
pub struct ParamSlot {
    declared: SqlType,
    pinned: bool,
    hinted: bool,
    position: usize,
    actual: ActualKind,
    value: Value,
    numeric: Option<NumericParse>,
    client_type: Option<FieldType>,
    long_data: Option<BytesMut>,
}

impl ParamSlot {
    fn new(decl: &ParamDeclaration, hint: Option<SqlType>) -> Self {
        Self {
            declared: decl.declared,
            pinned: decl.pinned,
            hinted: hint.is_some() && !decl.pinned,
            position: decl.position,
            actual: ActualKind::Null,
            value: Value::Null,
            numeric: None,
            client_type: None,
            long_data: None,
        }
    }

    /// Type the current plan was compiled against.
    #[must_use]
    pub fn declared(&self) -> SqlType {
        self.declared
    }

    /// Returns true if an explicit cast fixed the declared type.
    #[must_use]
    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    /// Offset of the placeholder in the statement text.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Kind of the bound value.
    #[must_use]
    pub fn actual(&self) -> ActualKind {
        self.actual
    }

    /// Bound value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Numeric reading of a string value, if one was bound.
    #[must_use]
    pub fn numeric(&self) -> Option<&NumericParse> {
        self.numeric.as_ref()
    }

    /// Wire type the client bound with.
    #[must_use]
    pub fn client_type(&self) -> Option<FieldType> {
        self.client_type
    }

    /// Returns true if long data has been streamed since the last execute.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.long_data.is_some()
    }

    /// Type hint to carry into a recompilation.
    fn hint(&self) -> Option<SqlType> {
        match compat::check(self) {
            Compatibility::Reprepare { hint } => Some(hint),
            Compatibility::Compatible if self.hinted => Some(self.declared),
            Compatibility::Compatible => None,
        }
    }

    fn append_long_data(&mut self, chunk: &[u8], limit: usize) -> Result<(), String> {
        let buf = self.long_data.get_or_insert_with(BytesMut::new);
        if buf.len() + chunk.len() > limit {
            return Err(format!(
                "accumulated {} bytes exceeds limit of {limit}",
                buf.len() + chunk.len()
            ));
        }
        buf.extend_from_slice(chunk);
        Ok(())
    }

    fn bind(&mut self, index: usize, input: &ParamInput) -> StmtResult<Option<Condition>> {
        self.client_type = Some(input.field_type);
        let value = if let Some(streamed) = self.long_data.take() {
            if !input.field_type.accepts_long_data() {
                return Err(StmtError::TypeIncompatibleWithStreamedData {
                    index,
                    field_type: input.field_type,
                });
            }
            Value::Bytes(streamed.freeze())
        } else {
            match &input.raw {
                None => Value::Null,
                Some(raw) => decode_exact(index, input, raw)?,
            }
        };
        trace!(index, field_type = %input.field_type, value = value.kind_name(), "bound parameter");
        Ok(self.derive_actual(value))
    }

    /// Records the value and its actual kind, returning a truncation warning
    /// for malformed numeric strings.
    fn derive_actual(&mut self, value: Value) -> Option<Condition> {
        let mut warning = None;
        let (actual, numeric) = match &value {
            Value::Null => (ActualKind::Null, None),
            Value::Int(_) => (ActualKind::Integer { unsigned: false }, None),
            Value::UInt(_) => (ActualKind::Integer { unsigned: true }, None),
            Value::Double(_) => (ActualKind::Float, None),
            Value::Decimal(_) => (ActualKind::Decimal, None),
            Value::Temporal(Temporal::Date(_)) => (ActualKind::Date, None),
            Value::Temporal(Temporal::DateTime(_)) => (ActualKind::DateTime, None),
            Value::Temporal(Temporal::Time(_)) => (ActualKind::Time, None),
            Value::Bytes(raw) => {
                let parse = NumericParse::parse(raw, self.declared.prefers_unsigned());
                if self.declared.is_numeric() {
                    if parse.truncated {
                        warning = Some(Condition::warning(
                            ErrorCode::TruncatedValue,
                            format!(
                                "Truncated incorrect {} value: '{}'",
                                self.declared,
                                String::from_utf8_lossy(raw)
                            ),
                        ));
                    }
                    (parse.actual_kind(), Some(parse))
                } else {
                    (ActualKind::String, Some(parse))
                }
            }
        };
        self.actual = actual;
        self.numeric = numeric;
        self.value = value;
        warning
    }

    fn take_binding_from(&mut self, old: &mut Self) {
        self.actual = old.actual;
        self.value = std::mem::replace(&mut old.value, Value::Null);
        self.numeric = old.numeric.take();
        self.client_type = old.client_type;
        self.long_data = old.long_data.take();
    }

    fn clear_transient(&mut self) {
        self.actual = ActualKind::Null;
        self.value = Value::Null;
        self.numeric = None;
        self.client_type = None;
        self.long_data = None;
    }
}

fn decode_exact(index: usize, input: &ParamInput, raw: &[u8]) -> StmtResult<Value> {
    let (value, used) = nexus_wire::decode(input.field_type, input.unsigned, raw).map_err(|e| {
        StmtError::ParamTypeInvalid {
            index,
            reason: e.to_string(),
        }
    })?;
    if used != raw.len() {
        return Err(StmtError::ParamTypeInvalid {
            index,
            reason: format!(
                "{} value is {} bytes, expected {used}",
                input.field_type,
                raw.len()
            ),
        });
    }
    Ok(value)
}

// =============================================================================
// ParamSlots
// =============================================================================

/// The ordered parameter slots of a statement.
#[derive(Debug, Clone, Default)]
pub struct ParamSlots {
    slots: Vec<ParamSlot>,
}

impl ParamSlots {
    /// Builds slots from compiler declarations and the hints they were
    /// compiled with.
    #[must_use]
    pub fn from_declarations(decls: &[ParamDeclaration], hints: &[Option<SqlType>]) -> Self {
        let slots = decls
            .iter()
            .enumerate()
            .map(|(i, decl)| ParamSlot::new(decl, hints.get(i).copied().flatten()))
            .collect();
        Self { slots }
    }

    /// Number of placeholders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if the statement has no placeholders.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// All slots, in placeholder order.
    #[must_use]
    pub fn slots(&self) -> &[ParamSlot] {
        &self.slots
    }

    /// Declared types, in placeholder order.
    #[must_use]
    pub fn declared_types(&self) -> Vec<SqlType> {
        self.slots.iter().map(ParamSlot::declared).collect()
    }

    /// Binds client values, returning any warnings raised while reading them.
    pub fn bind(&mut self, inputs: &[ParamInput], policy: SurplusPolicy) -> StmtResult<Vec<Condition>> {
        let expected = self.slots.len();
        let short = inputs.len() < expected;
        let surplus = inputs.len() > expected && policy == SurplusPolicy::Reject;
        if short || surplus {
            return Err(StmtError::ParamCountMismatch {
                expected,
                actual: inputs.len(),
            });
        }
        let mut warnings = Vec::new();
        for (index, (slot, input)) in self.slots.iter_mut().zip(inputs).enumerate() {
            if let Some(warning) = slot.bind(index, input)? {
                warnings.push(warning);
            }
        }
        Ok(warnings)
    }

    /// First slot whose bound value is incompatible with its declaration.
    #[must_use]
    pub fn first_incompatible(&self) -> Option<(usize, SqlType)> {
        self.slots
            .iter()
            .enumerate()
            .find_map(|(i, slot)| match compat::check(slot) {
                Compatibility::Reprepare { hint } => Some((i, hint)),
                Compatibility::Compatible => None,
            })
    }

    /// Type hints for recompiling these slots.
    #[must_use]
    pub fn hints(&self) -> Vec<Option<SqlType>> {
        self.slots.iter().map(ParamSlot::hint).collect()
    }

    /// Appends streamed bytes to a slot.
    pub(crate) fn append_long_data(
        &mut self,
        index: usize,
        chunk: &[u8],
        limit: usize,
    ) -> StmtResult<()> {
        let count = self.slots.len();
        let slot = self.slots.get_mut(index).ok_or_else(|| StmtError::LongData {
            index,
            reason: format!("statement has {count} parameters"),
        })?;
        slot.append_long_data(chunk, limit)
            .map_err(|reason| StmtError::LongData { index, reason })
    }

    /// Moves bindings from the slots of a previous compilation. Both sides
    /// must have the same length.
    pub(crate) fn take_bindings_from(&mut self, old: &mut Self) {
        for (new, old) in self.slots.iter_mut().zip(old.slots.iter_mut()) {
            new.take_binding_from(old);
        }
    }

    /// Clears values, actual kinds and long data.
    pub(crate) fn clear_transient(&mut self) {
        self.slots.iter_mut().for_each(ParamSlot::clear_transient);
    }
}
