use bytes::Bytes;
use prost::Message;
use snap_plugin_error::PluginError;
use tonic::{Code, Status};

/// Turns a plugin error into a failure status. The error reply `reply`
/// (the operation's reply message with its error field set) travels in the
/// status details so hosts that look there find the message too.
pub(crate) fn fault_status<M: Message>(err: &PluginError, reply: M) -> Status {
    Status::with_details(
        Code::Unknown,
        err.to_string(),
        Bytes::from(reply.encode_to_vec()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use snap_plugin_types::rpc;

    #[test]
    fn details_carry_error_reply() {
        let err = PluginError::fault("no such sensor");
        let status = fault_status(
            &err,
            rpc::ErrReply {
                error: err.to_string(),
            },
        );

        assert_eq!(status.code(), Code::Unknown);
        assert_eq!(status.message(), "no such sensor");

        let reply = rpc::ErrReply::decode(status.details()).unwrap();
        assert_eq!(reply.error, "no such sensor");
    }
}
