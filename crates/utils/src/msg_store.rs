use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::stream_msg::StreamMsg;

const CHANNEL_CAPACITY: usize = 1024;

/// Fan-out hub for one live stream. Subscribers get their own snapshot first
/// and then only what is pushed after they joined.
pub struct MsgStore {
    sender: broadcast::Sender<StreamMsg>,
}

impl Default for MsgStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MsgStore {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn push(&self, msg: StreamMsg) {
        // no subscribers is not an error
        let _ = self.sender.send(msg);
    }

    pub fn push_patch(&self, patch: json_patch::Patch) {
        self.push(StreamMsg::JsonPatch(patch));
    }

    pub fn push_finished(&self) {
        self.push(StreamMsg::Finished);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn get_receiver(&self) -> broadcast::Receiver<StreamMsg> {
        self.sender.subscribe()
    }

    /// Messages pushed from now on.
    pub fn stream_live_only(
        &self,
    ) -> futures::stream::BoxStream<'static, Result<StreamMsg, std::io::Error>> {
        Box::pin(live_stream(self.get_receiver()))
    }
}

/// A subscriber that falls behind loses messages; it is told to refetch
/// instead of silently drifting from the server's state.
fn live_stream(
    rx: broadcast::Receiver<StreamMsg>,
) -> impl futures::Stream<Item = Result<StreamMsg, std::io::Error>> + Send + 'static {
    BroadcastStream::new(rx).map(|res| match res {
        Ok(msg) => Ok(msg),
        Err(e) => Ok(StreamMsg::RefreshRequired {
            reason: format!("stream lagged: {e}"),
        }),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn remove_patch(path: &str) -> json_patch::Patch {
        serde_json::from_value(serde_json::json!([{ "op": "remove", "path": path }])).unwrap()
    }

    async fn collect_until_finished(
        mut stream: futures::stream::BoxStream<'static, Result<StreamMsg, std::io::Error>>,
    ) -> Vec<String> {
        let mut received = Vec::new();
        let timeout = tokio::time::sleep(Duration::from_millis(200));
        tokio::pin!(timeout);

        loop {
            tokio::select! {
                _ = &mut timeout => break,
                msg = stream.next() => match msg {
                    Some(Ok(StreamMsg::Finished)) => {
                        received.push("finished".to_string());
                        break;
                    }
                    Some(Ok(StreamMsg::JsonPatch(patch))) => {
                        received.push(serde_json::to_value(&patch).unwrap()[0]["path"]
                            .as_str()
                            .unwrap()
                            .to_string());
                    }
                    Some(Ok(StreamMsg::RefreshRequired { .. })) => {
                        received.push("refresh".to_string());
                    }
                    _ => break,
                }
            }
        }
        received
    }

    #[tokio::test]
    async fn test_stream_live_only_sees_later_pushes() {
        let store = MsgStore::new();
        store.push_patch(remove_patch("/before/0"));

        let stream = store.stream_live_only();
        store.push_patch(remove_patch("/live/0"));
        store.push_finished();

        let received = collect_until_finished(stream).await;
        assert_eq!(received, vec!["/live/0", "finished"]);
    }

    #[test]
    fn test_subscriber_count_tracks_receivers() {
        let store = MsgStore::new();
        assert_eq!(store.subscriber_count(), 0);
        let _rx = store.get_receiver();
        assert_eq!(store.subscriber_count(), 1);
    }
}
