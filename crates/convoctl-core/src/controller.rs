//! Client for the conversation daemon.
//!
//! The daemon listens on a Unix domain socket; the protocol is
//! newline-delimited JSON, one request line and one response line per
//! connection:
//!
//! ```json
//! // Request
//! {"version":1,"request_id":"req-...","command":"send-message","payload":{...}}
//! // Response
//! {"version":1,"request_id":"req-...","status":"ok","payload":{...}}
//! ```
//!
//! The socket path is `$CONVOCTL_SOCKET` when set, else
//! `$XDG_RUNTIME_DIR/convoctl/convoctld.sock`, else
//! `/tmp/convoctl/convoctld.sock`.
//!
//! All daemon operations go through the [`Controller`] trait so the
//! dispatch engine can be tested against a deterministic fake. Send
//! responses are opaque: the daemon does not report per-message delivery
//! status, so callers log the raw response and treat only transport-level
//! failures as errors.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Protocol version for the socket JSON protocol.
pub const PROTOCOL_VERSION: u32 = 1;

/// A request sent to the daemon over the Unix socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketRequest {
    /// Protocol version. Must be [`PROTOCOL_VERSION`].
    pub version: u32,
    /// Unique identifier echoed back in the response.
    pub request_id: String,
    /// Command to execute (e.g., `"send-message"`).
    pub command: String,
    /// Command-specific payload.
    pub payload: serde_json::Value,
}

/// A response received from the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketResponse {
    /// Protocol version.
    pub version: u32,
    /// Echoed `request_id` from the corresponding request.
    pub request_id: String,
    /// `"ok"` on success, `"error"` on failure.
    pub status: String,
    /// Response data on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    /// Error information on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SocketErrorBody>,
}

impl SocketResponse {
    /// Returns `true` if the response indicates success.
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Error details returned by the daemon on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketErrorBody {
    /// Machine-readable error code (e.g., `"ACCOUNT_NOT_FOUND"`).
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// One member of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMember {
    pub uri: String,
    pub role: String,
}

/// Failures talking to the daemon.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("cannot reach the conversation daemon at {path:?} ({source}); is convoctld running?")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("i/o error talking to the conversation daemon: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed response from the conversation daemon: {0}")]
    Protocol(String),

    #[error("daemon error {code}: {message}")]
    Daemon { code: String, message: String },

    #[error("the conversation daemon requires Unix domain sockets, unavailable on this platform")]
    Unsupported,
}

/// The daemon surface consumed by this program.
///
/// `send_message` and `send_file` return the daemon's raw response value;
/// an `Ok` only means the request round-trip succeeded, not that the
/// message was delivered.
pub trait Controller {
    fn enabled_accounts(&self) -> Result<Vec<String>, ControllerError>;
    fn account_details(&self, account: &str) -> Result<BTreeMap<String, String>, ControllerError>;
    fn add_account(&self, details: &BTreeMap<String, String>) -> Result<String, ControllerError>;
    fn remove_account(&self, account: &str) -> Result<(), ControllerError>;

    fn conversations(&self, account: &str) -> Result<Vec<String>, ControllerError>;
    fn start_conversation(&self, account: &str) -> Result<String, ControllerError>;
    fn remove_conversation(&self, account: &str, conversation: &str)
    -> Result<bool, ControllerError>;
    fn conversation_members(
        &self,
        account: &str,
        conversation: &str,
    ) -> Result<Vec<ConversationMember>, ControllerError>;
    fn add_conversation_member(
        &self,
        account: &str,
        conversation: &str,
        uri: &str,
    ) -> Result<(), ControllerError>;
    fn remove_conversation_member(
        &self,
        account: &str,
        conversation: &str,
        uri: &str,
    ) -> Result<(), ControllerError>;

    fn send_message(
        &self,
        account: &str,
        conversation: &str,
        body: &str,
        commit_id: &str,
        flag: u32,
    ) -> Result<serde_json::Value, ControllerError>;
    fn send_file(
        &self,
        account: &str,
        conversation: &str,
        path: &Path,
        display_name: &str,
        reply_to: &str,
    ) -> Result<serde_json::Value, ControllerError>;
}

/// Compute the well-known socket path for the conversation daemon.
pub fn daemon_socket_path() -> PathBuf {
    if let Ok(path) = std::env::var("CONVOCTL_SOCKET") {
        return PathBuf::from(path);
    }
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join("convoctl/convoctld.sock");
    }
    PathBuf::from("/tmp/convoctl/convoctld.sock")
}

/// The real daemon client.
#[derive(Debug, Clone)]
pub struct DaemonController {
    socket_path: PathBuf,
}

impl DaemonController {
    /// Client for the socket path resolved from the environment.
    pub fn from_env() -> Self {
        Self {
            socket_path: daemon_socket_path(),
        }
    }

    /// Client for an explicit socket path.
    pub fn with_socket(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    fn call(
        &self,
        command: &str,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, ControllerError> {
        let request = SocketRequest {
            version: PROTOCOL_VERSION,
            request_id: new_request_id(),
            command: command.to_string(),
            payload,
        };
        let response = self.roundtrip(&request)?;
        if !response.is_ok() {
            let (code, message) = match response.error {
                Some(body) => (body.code, body.message),
                None => ("UNKNOWN".to_string(), "daemon reported an error".to_string()),
            };
            return Err(ControllerError::Daemon { code, message });
        }
        Ok(response.payload.unwrap_or(serde_json::Value::Null))
    }

    #[cfg(unix)]
    fn roundtrip(&self, request: &SocketRequest) -> Result<SocketResponse, ControllerError> {
        use std::io::{BufRead, BufReader, Write};
        use std::os::unix::net::UnixStream;
        use std::time::Duration;

        let stream =
            UnixStream::connect(&self.socket_path).map_err(|source| ControllerError::Connect {
                path: self.socket_path.clone(),
                source,
            })?;

        // A hung daemon must not wedge the CLI.
        let timeout = Duration::from_secs(5);
        stream.set_read_timeout(Some(timeout)).ok();
        stream.set_write_timeout(Some(timeout)).ok();

        let request_line = serde_json::to_string(request)
            .map_err(|e| ControllerError::Protocol(e.to_string()))?;
        {
            let mut writer = std::io::BufWriter::new(&stream);
            writer.write_all(request_line.as_bytes())?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }

        let mut reader = BufReader::new(&stream);
        let mut response_line = String::new();
        let n = reader.read_line(&mut response_line)?;
        if n == 0 {
            return Err(ControllerError::Protocol(
                "daemon closed the connection without responding".to_string(),
            ));
        }

        serde_json::from_str(response_line.trim())
            .map_err(|e| ControllerError::Protocol(e.to_string()))
    }

    #[cfg(not(unix))]
    fn roundtrip(&self, _request: &SocketRequest) -> Result<SocketResponse, ControllerError> {
        Err(ControllerError::Unsupported)
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    payload: serde_json::Value,
    field: &str,
) -> Result<T, ControllerError> {
    let value = payload
        .get(field)
        .cloned()
        .ok_or_else(|| ControllerError::Protocol(format!("response is missing '{field}'")))?;
    serde_json::from_value(value).map_err(|e| ControllerError::Protocol(e.to_string()))
}

impl Controller for DaemonController {
    fn enabled_accounts(&self) -> Result<Vec<String>, ControllerError> {
        let payload = self.call("get-enabled-accounts", serde_json::json!({}))?;
        decode(payload, "accounts")
    }

    fn account_details(&self, account: &str) -> Result<BTreeMap<String, String>, ControllerError> {
        let payload =
            self.call("get-account-details", serde_json::json!({ "account": account }))?;
        decode(payload, "details")
    }

    fn add_account(&self, details: &BTreeMap<String, String>) -> Result<String, ControllerError> {
        let payload = self.call("add-account", serde_json::json!({ "details": details }))?;
        decode(payload, "account")
    }

    fn remove_account(&self, account: &str) -> Result<(), ControllerError> {
        self.call("remove-account", serde_json::json!({ "account": account }))?;
        Ok(())
    }

    fn conversations(&self, account: &str) -> Result<Vec<String>, ControllerError> {
        let payload = self.call("get-conversations", serde_json::json!({ "account": account }))?;
        decode(payload, "conversations")
    }

    fn start_conversation(&self, account: &str) -> Result<String, ControllerError> {
        let payload =
            self.call("start-conversation", serde_json::json!({ "account": account }))?;
        decode(payload, "conversation")
    }

    fn remove_conversation(
        &self,
        account: &str,
        conversation: &str,
    ) -> Result<bool, ControllerError> {
        let payload = self.call(
            "remove-conversation",
            serde_json::json!({ "account": account, "conversation": conversation }),
        )?;
        decode(payload, "removed")
    }

    fn conversation_members(
        &self,
        account: &str,
        conversation: &str,
    ) -> Result<Vec<ConversationMember>, ControllerError> {
        let payload = self.call(
            "get-conversation-members",
            serde_json::json!({ "account": account, "conversation": conversation }),
        )?;
        decode(payload, "members")
    }

    fn add_conversation_member(
        &self,
        account: &str,
        conversation: &str,
        uri: &str,
    ) -> Result<(), ControllerError> {
        self.call(
            "add-conversation-member",
            serde_json::json!({ "account": account, "conversation": conversation, "uri": uri }),
        )?;
        Ok(())
    }

    fn remove_conversation_member(
        &self,
        account: &str,
        conversation: &str,
        uri: &str,
    ) -> Result<(), ControllerError> {
        self.call(
            "remove-conversation-member",
            serde_json::json!({ "account": account, "conversation": conversation, "uri": uri }),
        )?;
        Ok(())
    }

    fn send_message(
        &self,
        account: &str,
        conversation: &str,
        body: &str,
        commit_id: &str,
        flag: u32,
    ) -> Result<serde_json::Value, ControllerError> {
        self.call(
            "send-message",
            serde_json::json!({
                "account": account,
                "conversation": conversation,
                "body": body,
                "commit_id": commit_id,
                "flag": flag,
            }),
        )
    }

    fn send_file(
        &self,
        account: &str,
        conversation: &str,
        path: &Path,
        display_name: &str,
        reply_to: &str,
    ) -> Result<serde_json::Value, ControllerError> {
        self.call(
            "send-file",
            serde_json::json!({
                "account": account,
                "conversation": conversation,
                "path": path,
                "display_name": display_name,
                "reply_to": reply_to,
            }),
        )
    }
}

/// Generate a compact request identifier from the PID and a nanosecond
/// timestamp. The daemon only echoes it back for correlation.
fn new_request_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    let pid = std::process::id();
    format!("req-{pid}-{nanos}")
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::cell::RefCell;

    /// One recorded daemon call.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        EnabledAccounts,
        SendMessage {
            account: String,
            conversation: String,
            body: String,
        },
        SendFile {
            account: String,
            conversation: String,
            display_name: String,
        },
    }

    /// Scriptable in-memory controller. Records every send in order and can
    /// be told to fail sends whose body or display name contains a token.
    pub struct MockController {
        pub accounts: Vec<String>,
        pub calls: RefCell<Vec<Call>>,
        pub fail_message_containing: Option<String>,
        pub fail_file_containing: Option<String>,
    }

    impl MockController {
        pub fn with_accounts(accounts: &[&str]) -> Self {
            Self {
                accounts: accounts.iter().map(|a| (*a).to_string()).collect(),
                calls: RefCell::new(Vec::new()),
                fail_message_containing: None,
                fail_file_containing: None,
            }
        }

        pub fn sent_messages(&self) -> Vec<(String, String)> {
            self.calls
                .borrow()
                .iter()
                .filter_map(|c| match c {
                    Call::SendMessage {
                        conversation, body, ..
                    } => Some((conversation.clone(), body.clone())),
                    _ => None,
                })
                .collect()
        }

        pub fn sent_files(&self) -> Vec<(String, String)> {
            self.calls
                .borrow()
                .iter()
                .filter_map(|c| match c {
                    Call::SendFile {
                        conversation,
                        display_name,
                        ..
                    } => Some((conversation.clone(), display_name.clone())),
                    _ => None,
                })
                .collect()
        }

        fn injected_failure(&self) -> ControllerError {
            ControllerError::Daemon {
                code: "INJECTED".to_string(),
                message: "injected test failure".to_string(),
            }
        }
    }

    impl Controller for MockController {
        fn enabled_accounts(&self) -> Result<Vec<String>, ControllerError> {
            self.calls.borrow_mut().push(Call::EnabledAccounts);
            Ok(self.accounts.clone())
        }

        fn account_details(
            &self,
            _account: &str,
        ) -> Result<BTreeMap<String, String>, ControllerError> {
            Ok(BTreeMap::new())
        }

        fn add_account(
            &self,
            _details: &BTreeMap<String, String>,
        ) -> Result<String, ControllerError> {
            Ok("new-account".to_string())
        }

        fn remove_account(&self, _account: &str) -> Result<(), ControllerError> {
            Ok(())
        }

        fn conversations(&self, _account: &str) -> Result<Vec<String>, ControllerError> {
            Ok(Vec::new())
        }

        fn start_conversation(&self, _account: &str) -> Result<String, ControllerError> {
            Ok("new-conversation".to_string())
        }

        fn remove_conversation(
            &self,
            _account: &str,
            _conversation: &str,
        ) -> Result<bool, ControllerError> {
            Ok(true)
        }

        fn conversation_members(
            &self,
            _account: &str,
            _conversation: &str,
        ) -> Result<Vec<ConversationMember>, ControllerError> {
            Ok(Vec::new())
        }

        fn add_conversation_member(
            &self,
            _account: &str,
            _conversation: &str,
            _uri: &str,
        ) -> Result<(), ControllerError> {
            Ok(())
        }

        fn remove_conversation_member(
            &self,
            _account: &str,
            _conversation: &str,
            _uri: &str,
        ) -> Result<(), ControllerError> {
            Ok(())
        }

        fn send_message(
            &self,
            account: &str,
            conversation: &str,
            body: &str,
            _commit_id: &str,
            _flag: u32,
        ) -> Result<serde_json::Value, ControllerError> {
            self.calls.borrow_mut().push(Call::SendMessage {
                account: account.to_string(),
                conversation: conversation.to_string(),
                body: body.to_string(),
            });
            if let Some(token) = &self.fail_message_containing {
                if body.contains(token.as_str()) {
                    return Err(self.injected_failure());
                }
            }
            Ok(serde_json::json!({ "queued": true }))
        }

        fn send_file(
            &self,
            account: &str,
            conversation: &str,
            _path: &Path,
            display_name: &str,
            _reply_to: &str,
        ) -> Result<serde_json::Value, ControllerError> {
            self.calls.borrow_mut().push(Call::SendFile {
                account: account.to_string(),
                conversation: conversation.to_string(),
                display_name: display_name.to_string(),
            });
            if let Some(token) = &self.fail_file_containing {
                if display_name.contains(token.as_str()) {
                    return Err(self.injected_failure());
                }
            }
            Ok(serde_json::json!({ "queued": true }))
        }
    }
}
