//! Signaling capability and the request payloads streams depend on
//!
//! The transport is supplied by the host application; this module only fixes
//! the method names and payload shapes.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SignalingError {
    /// The request payload could not be encoded; nothing was sent
    #[error("request could not be encoded: {0}")]
    InvalidRequest(String),

    /// The coordinator answered with an error object
    #[error("remote error {code}: {message}")]
    Remote { code: i64, message: String },

    /// The request never got an answer
    #[error("transport error: {0}")]
    Transport(String),

    /// The answer could not be decoded into the expected shape
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Sends a named request and resolves with the coordinator's response
#[async_trait]
pub trait SignalingClient: Send + Sync {
    async fn send_request(&self, method: &str, params: Value) -> Result<Value, SignalingError>;
}

/// A typed request with a fixed method name and response shape
pub trait SignalingRequest: Serialize {
    const METHOD: &'static str;
    type Response: DeserializeOwned;
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublishVideo {
    pub sdp_offer: String,
    pub do_loopback: bool,
}

impl SignalingRequest for PublishVideo {
    const METHOD: &'static str = "publishVideo";
    type Response = SdpAnswer;
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveVideoFrom {
    pub sender: String,
    pub sdp_offer: String,
}

impl SignalingRequest for ReceiveVideoFrom {
    const METHOD: &'static str = "receiveVideoFrom";
    type Response = SdpAnswer;
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OnIceCandidate {
    pub endpoint_name: String,
    pub candidate: String,
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_m_line_index: Option<u16>,
}

impl SignalingRequest for OnIceCandidate {
    const METHOD: &'static str = "onIceCandidate";
    type Response = Value;
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SdpAnswer {
    pub sdp_answer: String,
}

/// Serialises `req`, sends it under its method name and decodes the response
pub async fn request<R: SignalingRequest>(
    client: &dyn SignalingClient,
    req: &R,
) -> Result<R::Response, SignalingError> {
    let params =
        serde_json::to_value(req).map_err(|e| SignalingError::InvalidRequest(e.to_string()))?;
    debug!(method = R::METHOD, "sending signaling request");
    let response = client.send_request(R::METHOD, params).await?;
    serde_json::from_value(response).map_err(|e| SignalingError::MalformedResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    struct Recorder {
        sent: Mutex<Vec<(String, Value)>>,
        reply: Result<Value, SignalingError>,
    }

    #[async_trait]
    impl SignalingClient for Recorder {
        async fn send_request(
            &self,
            method: &str,
            params: Value,
        ) -> Result<Value, SignalingError> {
            self.sent.lock().push((method.to_string(), params));
            self.reply.clone()
        }
    }

    #[tokio::test]
    async fn publish_video_payload_shape() {
        let client = Recorder {
            sent: Mutex::new(Vec::new()),
            reply: Ok(json!({ "sdpAnswer": "v=0 answer" })),
        };
        let answer = request(
            &client,
            &PublishVideo {
                sdp_offer: "v=0 offer".into(),
                do_loopback: false,
            },
        )
        .await
        .unwrap();

        assert_eq!(answer.sdp_answer, "v=0 answer");
        let sent = client.sent.lock();
        assert_eq!(sent[0].0, "publishVideo");
        assert_eq!(
            sent[0].1,
            json!({ "sdpOffer": "v=0 offer", "doLoopback": false })
        );
    }

    #[tokio::test]
    async fn receive_video_from_payload_shape() {
        let client = Recorder {
            sent: Mutex::new(Vec::new()),
            reply: Ok(json!({ "sdpAnswer": "a" })),
        };
        request(
            &client,
            &ReceiveVideoFrom {
                sender: "alice_webcam".into(),
                sdp_offer: "o".into(),
            },
        )
        .await
        .unwrap();

        let sent = client.sent.lock();
        assert_eq!(sent[0].0, "receiveVideoFrom");
        assert_eq!(sent[0].1, json!({ "sender": "alice_webcam", "sdpOffer": "o" }));
    }

    #[test]
    fn ice_candidate_uses_kurento_field_names() {
        let value = serde_json::to_value(OnIceCandidate {
            endpoint_name: "alice".into(),
            candidate: "candidate:1 1 UDP 1 10.0.0.1 5000 typ host".into(),
            sdp_mid: Some("0".into()),
            sdp_m_line_index: Some(0),
        })
        .unwrap();
        assert_eq!(value["endpointName"], "alice");
        assert_eq!(value["sdpMLineIndex"], 0);
    }

    #[tokio::test]
    async fn undecodable_answer_is_malformed() {
        let client = Recorder {
            sent: Mutex::new(Vec::new()),
            reply: Ok(json!({ "unexpected": true })),
        };
        let err = request(
            &client,
            &PublishVideo {
                sdp_offer: "o".into(),
                do_loopback: true,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SignalingError::MalformedResponse(_)));
    }

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("unsupported payload"))
        }
    }

    impl SignalingRequest for Unencodable {
        const METHOD: &'static str = "unencodable";
        type Response = Value;
    }

    #[tokio::test]
    async fn unencodable_request_is_never_sent() {
        let client = Recorder {
            sent: Mutex::new(Vec::new()),
            reply: Ok(json!({})),
        };
        let err = request(&client, &Unencodable).await.unwrap_err();
        assert!(matches!(err, SignalingError::InvalidRequest(ref msg) if msg.contains("unsupported payload")));
        assert!(client.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn remote_error_passes_through() {
        let client = Recorder {
            sent: Mutex::new(Vec::new()),
            reply: Err(SignalingError::Remote {
                code: 103,
                message: "room closed".into(),
            }),
        };
        let err = request(
            &client,
            &ReceiveVideoFrom {
                sender: "s".into(),
                sdp_offer: "o".into(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(
            err,
            SignalingError::Remote {
                code: 103,
                message: "room closed".into()
            }
        );
    }
}
