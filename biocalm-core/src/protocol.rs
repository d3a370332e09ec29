//! Wire protocol with the acquisition service
//!
//! Every message travels as an envelope `{"event": <name>, "data": <payload>}`.
//! Outbound messages are what the orchestrator asks of the service; inbound
//! events are what the service reports back.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::{BaselineSnapshot, Demographics, QuestionnaireResponses, QuestionnaireResult};
use crate::model::{Sample, SampleSeries};

/// Phase tag sent with `start_session`.
pub const ACTIVATION_PHASE_TAG: &str = "activation";

/// Inbound event names the orchestrator understands.
pub const KNOWN_INBOUND_EVENTS: &[&str] = &[
    "system_initialized",
    "hamilton_pre_saved",
    "baseline_complete",
    "session_started",
    "sensor_data",
    "session_stopped",
    "hamilton_post_saved",
    "system_reset",
    "phase_changed",
    "error",
];

// ============================================================================
// Outbound
// ============================================================================

/// Control message sent to the acquisition service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Arm data acquisition.
    InitializeSystem {},

    /// Persist the pre-session questionnaire with demographics.
    SaveHamiltonPre {
        /// Raw answers.
        responses: QuestionnaireResponses,
        /// Psychic subscore.
        psychic: u32,
        /// Somatic subscore.
        somatic: u32,
        /// Total score.
        total: u32,
        /// Participant demographics.
        demographics: Demographics,
    },

    /// Begin baseline capture.
    StartBaseline {
        /// Capture window in seconds.
        duration: u32,
    },

    /// Mark the start of the recorded session.
    StartSession {
        /// Always [`ACTIVATION_PHASE_TAG`].
        phase: String,
    },

    /// Request the end of the recorded session.
    StopSession {},

    /// Persist the post-session questionnaire.
    SaveHamiltonPost {
        /// Raw answers.
        responses: QuestionnaireResponses,
        /// Psychic subscore.
        psychic: u32,
        /// Somatic subscore.
        somatic: u32,
        /// Total score.
        total: u32,
    },

    /// Clear all service state.
    ResetSystem {},
}

impl OutboundMessage {
    /// `save_hamilton_pre` from a scored questionnaire.
    #[must_use]
    pub fn save_hamilton_pre(result: &QuestionnaireResult, demographics: Demographics) -> Self {
        Self::SaveHamiltonPre {
            responses: result.responses().clone(),
            psychic: result.psychic(),
            somatic: result.somatic(),
            total: result.total(),
            demographics,
        }
    }

    /// `save_hamilton_post` from a scored questionnaire.
    #[must_use]
    pub fn save_hamilton_post(result: &QuestionnaireResult) -> Self {
        Self::SaveHamiltonPost {
            responses: result.responses().clone(),
            psychic: result.psychic(),
            somatic: result.somatic(),
            total: result.total(),
        }
    }

    /// `start_session` tagged with the activation phase.
    #[must_use]
    pub fn start_session() -> Self {
        Self::StartSession {
            phase: ACTIVATION_PHASE_TAG.to_string(),
        }
    }

    /// Wire event name.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::InitializeSystem {} => "initialize_system",
            Self::SaveHamiltonPre { .. } => "save_hamilton_pre",
            Self::StartBaseline { .. } => "start_baseline",
            Self::StartSession { .. } => "start_session",
            Self::StopSession {} => "stop_session",
            Self::SaveHamiltonPost { .. } => "save_hamilton_post",
            Self::ResetSystem {} => "reset_system",
        }
    }
}

// ============================================================================
// Inbound
// ============================================================================

/// Payload of `session_stopped`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStopped {
    /// Whether the service managed to close the session.
    #[serde(default = "default_true")]
    pub success: bool,
    /// Recorded samples, possibly down-sampled.
    #[serde(default)]
    pub chart_data: SampleSeries,
    /// Service-side summary, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Value>,
    /// Failure reason when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SessionStopped {
    /// A successful stop carrying `samples`.
    #[must_use]
    pub const fn with_samples(samples: SampleSeries) -> Self {
        Self {
            success: true,
            chart_data: samples,
            summary: None,
            error: None,
        }
    }
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
struct BaselineWire {
    baseline_ecg: f64,
    baseline_bpm: f64,
    baseline_temp: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Acknowledgement {
    #[serde(default = "default_true")]
    success: bool,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionStartedWire {
    #[serde(default)]
    phase: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorWire {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct PhaseWire {
    #[serde(default)]
    phase: String,
}

/// Event reported by the acquisition service.
///
/// Decoding never fails on an unrecognised event name; such events become
/// [`InboundEvent::Unknown`] so they can be logged and counted.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Reply to `initialize_system`.
    SystemInitialized {
        /// Whether acquisition was armed.
        success: bool,
        /// Human-readable status.
        message: String,
    },
    /// Reply to `save_hamilton_pre`.
    HamiltonPreSaved {
        /// Whether the record was stored.
        success: bool,
    },
    /// Baseline computed.
    BaselineComplete(BaselineSnapshot),
    /// Recording started.
    SessionStarted {
        /// Phase tag echoed back.
        phase: String,
        /// Service-side session identifier.
        session_name: Option<String>,
    },
    /// Live reading.
    SensorData(Sample),
    /// Recording ended.
    SessionStopped(SessionStopped),
    /// Reply to `save_hamilton_post`.
    HamiltonPostSaved {
        /// Whether the record was stored.
        success: bool,
    },
    /// Service state cleared.
    SystemReset,
    /// Service-side phase bookkeeping changed.
    PhaseChanged {
        /// The service's phase tag.
        phase: String,
    },
    /// Service-side failure.
    Error {
        /// Failure description.
        message: String,
    },
    /// Unrecognised event name.
    Unknown {
        /// The name as received.
        event: String,
    },
}

impl InboundEvent {
    /// Wire event name (`"unknown"` is never produced by a real service).
    #[must_use]
    pub fn event_name(&self) -> &str {
        match self {
            Self::SystemInitialized { .. } => "system_initialized",
            Self::HamiltonPreSaved { .. } => "hamilton_pre_saved",
            Self::BaselineComplete(_) => "baseline_complete",
            Self::SessionStarted { .. } => "session_started",
            Self::SensorData(_) => "sensor_data",
            Self::SessionStopped(_) => "session_stopped",
            Self::HamiltonPostSaved { .. } => "hamilton_post_saved",
            Self::SystemReset => "system_reset",
            Self::PhaseChanged { .. } => "phase_changed",
            Self::Error { .. } => "error",
            Self::Unknown { event } => event,
        }
    }

    fn payload(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::SystemInitialized { success, message } => serde_json::to_value(Acknowledgement {
                success: *success,
                message: message.clone(),
            }),
            Self::HamiltonPreSaved { success } | Self::HamiltonPostSaved { success } => {
                Ok(serde_json::json!({ "success": success }))
            }
            Self::BaselineComplete(b) => serde_json::to_value(BaselineWire {
                baseline_ecg: b.ecg_voltage,
                baseline_bpm: b.bpm,
                baseline_temp: b.temperature_c,
            }),
            Self::SessionStarted {
                phase,
                session_name,
            } => serde_json::to_value(SessionStartedWire {
                phase: phase.clone(),
                session_name: session_name.clone(),
            }),
            Self::SensorData(sample) => serde_json::to_value(sample),
            Self::SessionStopped(stopped) => serde_json::to_value(stopped),
            Self::SystemReset | Self::Unknown { .. } => Ok(Value::Object(Map::new())),
            Self::PhaseChanged { phase } => serde_json::to_value(PhaseWire {
                phase: phase.clone(),
            }),
            Self::Error { message } => serde_json::to_value(ErrorWire {
                message: message.clone(),
            }),
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

fn decode<T: serde::de::DeserializeOwned, E: serde::de::Error>(
    event: &str,
    data: Value,
) -> Result<T, E> {
    let data = if data.is_null() {
        Value::Object(Map::new())
    } else {
        data
    };
    serde_json::from_value(data).map_err(|e| E::custom(format!("invalid {event} payload: {e}")))
}

impl<'de> Deserialize<'de> for InboundEvent {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let Envelope { event, data } = Envelope::deserialize(deserializer)?;

        let decoded = match event.as_str() {
            "system_initialized" => {
                let ack: Acknowledgement = decode(&event, data)?;
                Self::SystemInitialized {
                    success: ack.success,
                    message: ack.message,
                }
            }
            "hamilton_pre_saved" => Self::HamiltonPreSaved {
                success: decode::<Acknowledgement, _>(&event, data)?.success,
            },
            "hamilton_post_saved" => Self::HamiltonPostSaved {
                success: decode::<Acknowledgement, _>(&event, data)?.success,
            },
            "baseline_complete" => {
                let wire: BaselineWire = decode(&event, data)?;
                Self::BaselineComplete(BaselineSnapshot {
                    ecg_voltage: wire.baseline_ecg,
                    bpm: wire.baseline_bpm,
                    temperature_c: wire.baseline_temp,
                })
            }
            "session_started" => {
                let wire: SessionStartedWire = decode(&event, data)?;
                Self::SessionStarted {
                    phase: wire.phase,
                    session_name: wire.session_name,
                }
            }
            "sensor_data" => Self::SensorData(decode(&event, data)?),
            "session_stopped" => Self::SessionStopped(decode(&event, data)?),
            "system_reset" => Self::SystemReset,
            "phase_changed" => Self::PhaseChanged {
                phase: decode::<PhaseWire, _>(&event, data)?.phase,
            },
            "error" => Self::Error {
                message: decode::<ErrorWire, _>(&event, data)?.message,
            },
            _ => Self::Unknown { event },
        };
        Ok(decoded)
    }
}

impl Serialize for InboundEvent {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let data = self.payload().map_err(serde::ser::Error::custom)?;
        let mut envelope = serializer.serialize_struct("Envelope", 2)?;
        envelope.serialize_field("event", self.event_name())?;
        envelope.serialize_field("data", &data)?;
        envelope.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Sex, QuestionnaireResponses};
    use serde_json::json;

    #[test]
    fn outbound_empty_payloads_serialize_as_objects() {
        let json = serde_json::to_value(OutboundMessage::InitializeSystem {}).unwrap();
        assert_eq!(json, json!({"event": "initialize_system", "data": {}}));

        let json = serde_json::to_value(OutboundMessage::StopSession {}).unwrap();
        assert_eq!(json, json!({"event": "stop_session", "data": {}}));
    }

    #[test]
    fn save_hamilton_pre_carries_scores_and_demographics() {
        let result = QuestionnaireResult::score(
            QuestionnaireResponses::from_scores([2, 1, 3, 1, 0, 1, 2]),
            4,
        )
        .unwrap();
        let msg = OutboundMessage::save_hamilton_pre(
            &result,
            Demographics {
                age: 29,
                sex: Sex::Male,
            },
        );
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["event"], "save_hamilton_pre");
        assert_eq!(json["data"]["psychic"], 8);
        assert_eq!(json["data"]["somatic"], 2);
        assert_eq!(json["data"]["total"], 10);
        assert_eq!(json["data"]["responses"]["q3"], 3);
        assert_eq!(json["data"]["demographics"]["sex"], "male");
    }

    #[test]
    fn start_session_is_tagged_activation() {
        let json = serde_json::to_value(OutboundMessage::start_session()).unwrap();
        assert_eq!(
            json,
            json!({"event": "start_session", "data": {"phase": "activation"}})
        );
    }

    #[test]
    fn decodes_baseline_complete() {
        let event: InboundEvent = serde_json::from_value(json!({
            "event": "baseline_complete",
            "data": {"baseline_ecg": 1.65, "baseline_bpm": 72.0, "baseline_temp": 36.4}
        }))
        .unwrap();
        assert_eq!(
            event,
            InboundEvent::BaselineComplete(BaselineSnapshot {
                ecg_voltage: 1.65,
                bpm: 72.0,
                temperature_c: 36.4,
            })
        );
    }

    #[test]
    fn decodes_system_reset_without_data() {
        let event: InboundEvent = serde_json::from_str(r#"{"event": "system_reset"}"#).unwrap();
        assert_eq!(event, InboundEvent::SystemReset);
    }

    #[test]
    fn decodes_failed_session_stopped() {
        let event: InboundEvent = serde_json::from_value(json!({
            "event": "session_stopped",
            "data": {"success": false, "error": "disk full"}
        }))
        .unwrap();
        let InboundEvent::SessionStopped(stopped) = event else {
            panic!("expected session_stopped");
        };
        assert!(!stopped.success);
        assert!(stopped.chart_data.is_empty());
        assert_eq!(stopped.error.as_deref(), Some("disk full"));
    }

    #[test]
    fn sensor_data_defaults_bpm() {
        let event: InboundEvent = serde_json::from_value(json!({
            "event": "sensor_data",
            "data": {"ecg_voltage": 1.7, "ecg_change_percent": 3.0, "temperature": 36.6}
        }))
        .unwrap();
        let InboundEvent::SensorData(sample) = event else {
            panic!("expected sensor_data");
        };
        assert!((sample.bpm - 70.0).abs() < f64::EPSILON);
        assert_eq!(sample.ecg_change_percent, Some(3.0));
        assert_eq!(sample.temp_change_celsius, None);
    }

    #[test]
    fn unknown_event_is_preserved() {
        let event: InboundEvent =
            serde_json::from_str(r#"{"event": "firmware_update", "data": {"v": 2}}"#).unwrap();
        assert_eq!(
            event,
            InboundEvent::Unknown {
                event: "firmware_update".to_string()
            }
        );
        assert_eq!(event.event_name(), "firmware_update");
    }

    #[test]
    fn malformed_payload_is_an_error() {
        let result: Result<InboundEvent, _> = serde_json::from_value(json!({
            "event": "baseline_complete",
            "data": {"baseline_ecg": "high"}
        }));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("baseline_complete"), "{err}");
    }

    #[test]
    fn inbound_serializes_to_envelope() {
        let event = InboundEvent::SessionStarted {
            phase: "activation".to_string(),
            session_name: Some("sesion_01".to_string()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            json!({
                "event": "session_started",
                "data": {"phase": "activation", "session_name": "sesion_01"}
            })
        );
        let back: InboundEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn known_events_cover_every_variant_name() {
        let samples = [
            InboundEvent::SystemReset,
            InboundEvent::Error {
                message: String::new(),
            },
            InboundEvent::SensorData(Sample::new(1.0, 70.0, 36.0)),
            InboundEvent::SessionStopped(SessionStopped::with_samples(SampleSeries::default())),
        ];
        for event in samples {
            assert!(KNOWN_INBOUND_EVENTS.contains(&event.event_name()));
        }
    }
}
