use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Outbound notifications for the toast/UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Notification {
    /// A fly-to completed uncontested and its popup is showing.
    Navigated { name: String, description: String },
    AuthorizationError { message: String },
    EngineError { message: String },
    /// The viewport finished loading and its markers are in place.
    Ready { markers: usize },
    Cleared,
}

/// Fire-and-forget sender. A dropped receiver is not an error.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, notification: Notification) {
        let _ = self.tx.send(notification);
    }
}

/// Drains everything currently queued on `rx` without waiting.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{Notification, Notifier, drain};

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_string(&Notification::Navigated {
            name: "Grassy Knoll".into(),
            description: "d".into(),
        })
        .unwrap();
        assert_eq!(
            json,
            r#"{"kind":"navigated","name":"Grassy Knoll","description":"d"}"#
        );
        let json = serde_json::to_string(&Notification::AuthorizationError {
            message: "m".into(),
        })
        .unwrap();
        assert!(json.starts_with(r#"{"kind":"authorizationError""#));
    }

    #[test]
    fn emit_after_receiver_drop_is_silent() {
        let (notifier, rx) = Notifier::channel();
        drop(rx);
        notifier.emit(Notification::Cleared);
    }

    #[test]
    fn drain_returns_in_order() {
        let (notifier, mut rx) = Notifier::channel();
        notifier.emit(Notification::Cleared);
        notifier.emit(Notification::Ready { markers: 2 });
        assert_eq!(
            drain(&mut rx),
            vec![Notification::Cleared, Notification::Ready { markers: 2 }]
        );
        assert!(drain(&mut rx).is_empty());
    }
}
