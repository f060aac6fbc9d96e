//! This crate contains the protobuf message types of the Snap plugin RPC
//! protocol (`proto/snap/rpc/plugin.proto`).
//!
//! The generated file is checked in so that building the workspace does not
//! require `protoc`. Only messages are generated here; the service bindings
//! are provided by whichever transport hosts the plugin.

// Prost generated code - skip formatting and lint checks
#[rustfmt::skip]
#[allow(warnings)]
pub mod rpc {
    include!("proto/rpc.rs");
}

#[cfg(test)]
mod tests {
    use super::rpc::{CollectArg, CollectReply, Metric, MetricsArg, MetricsReply, metric};
    use prost::Message;

    #[test]
    fn collect_arg_survives_the_wire() {
        let arg = CollectArg {
            metrics_arg: Some(MetricsArg {
                metrics: vec![Metric {
                    unit: "B".to_string(),
                    data: Some(metric::Data::Uint64Data(42)),
                    ..Default::default()
                }],
            }),
            max_collect_duration: 5,
            max_metrics_buffer: 10,
        };

        let decoded = CollectArg::decode(arg.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded, arg);
    }

    #[test]
    fn empty_reply_still_carries_metrics_reply() {
        let reply = CollectReply {
            metrics_reply: Some(MetricsReply::default()),
            error: None,
        };

        let decoded = CollectReply::decode(reply.encode_to_vec().as_slice()).unwrap();
        assert!(decoded.metrics_reply.is_some());
        assert!(decoded.error.is_none());
    }
}
