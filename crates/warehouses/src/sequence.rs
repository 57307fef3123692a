//! Document code sequences (`IP000001`, `OD000042`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use stockledger_events::Event;

use crate::kind::SequenceType;

/// Stream id of the sequence for one type inside a tenant.
pub fn sequence_id(tenant_id: TenantId, sequence_type: SequenceType) -> AggregateId {
    AggregateId::derived(tenant_id, &format!("warehouses.sequence:{}", sequence_type.prefix()))
}

/// Prefix followed by the value zero-padded to six digits.
pub fn format_code(sequence_type: SequenceType, value: u64) -> String {
    format!("{}{:06}", sequence_type.prefix(), value)
}

/// Aggregate root: CodeSequence. Values start at 1 and never repeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSequence {
    id: AggregateId,
    tenant_id: Option<TenantId>,
    value: u64,
    version: u64,
}

impl CodeSequence {
    pub fn empty(id: AggregateId) -> Self {
        Self {
            id,
            tenant_id: None,
            value: 0,
            version: 0,
        }
    }

    /// Last issued value (0 before the first code).
    pub fn value(&self) -> u64 {
        self.value
    }
}

impl AggregateRoot for CodeSequence {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCode {
    pub tenant_id: TenantId,
    pub sequence_type: SequenceType,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequenceCommand {
    IssueCode(IssueCode),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeIssued {
    pub tenant_id: TenantId,
    pub sequence_type: SequenceType,
    pub value: u64,
    pub code: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequenceEvent {
    CodeIssued(CodeIssued),
}

impl Event for SequenceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SequenceEvent::CodeIssued(_) => "warehouses.sequence.code_issued",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SequenceEvent::CodeIssued(e) => e.occurred_at,
        }
    }
}

impl Aggregate for CodeSequence {
    type Command = SequenceCommand;
    type Event = SequenceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SequenceEvent::CodeIssued(e) => {
                self.tenant_id.get_or_insert(e.tenant_id);
                self.value = e.value;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SequenceCommand::IssueCode(cmd) => {
                if let Some(t) = self.tenant_id {
                    if t != cmd.tenant_id {
                        return Err(DomainError::invariant("tenant mismatch"));
                    }
                }
                let value = self
                    .value
                    .checked_add(1)
                    .ok_or_else(|| DomainError::invariant("sequence exhausted"))?;

                Ok(vec![SequenceEvent::CodeIssued(CodeIssued {
                    tenant_id: cmd.tenant_id,
                    sequence_type: cmd.sequence_type,
                    value,
                    code: format_code(cmd.sequence_type, value),
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_zero_padded_and_increment() {
        let tenant_id = TenantId::new();
        let mut seq = CodeSequence::empty(sequence_id(tenant_id, SequenceType::Import));
        let cmd = SequenceCommand::IssueCode(IssueCode {
            tenant_id,
            sequence_type: SequenceType::Import,
            occurred_at: Utc::now(),
        });

        let mut codes = Vec::new();
        for _ in 0..3 {
            let events = seq.handle(&cmd).unwrap();
            for e in &events {
                let SequenceEvent::CodeIssued(issued) = e;
                codes.push(issued.code.clone());
                seq.apply(e);
            }
        }

        assert_eq!(codes, vec!["IP000001", "IP000002", "IP000003"]);
        assert_eq!(seq.value(), 3);
    }

    #[test]
    fn values_past_six_digits_keep_growing() {
        assert_eq!(format_code(SequenceType::Order, 1_234_567), "OD1234567");
    }

    #[test]
    fn sequence_streams_differ_per_type() {
        let t = TenantId::new();
        assert_ne!(
            sequence_id(t, SequenceType::Import),
            sequence_id(t, SequenceType::Export)
        );
    }
}
