//! Typed message bus.
//!
//! Messages form a closed enum, so a payload can never be constructed with
//! missing fields. Topics are dotted lowercase strings derived from the
//! variant name (`ItemNameChanged` publishes on `ride.item.name.changed`),
//! and a subscription to a topic also receives every topic below it
//! (`ride.test` hears `ride.test.passed`).
//!
//! Delivery is synchronous and sequential on the publishing thread. A
//! listener returning an error aborts the remaining listeners for that
//! message; the error is logged and never propagates to the publisher.

use std::cell::RefCell;
use std::path::PathBuf;

/// Everything the engine announces.
#[derive(Debug, Clone, PartialEq)]
pub enum RideMessage {
    TreeSelection { item: String },
    BeforeSaving { path: PathBuf },
    Saved { path: PathBuf },
    SaveAll,
    DataChangedToDirty { path: PathBuf },
    DataDirtyCleared { path: PathBuf },
    DataFileSet { path: PathBuf },
    ItemMovedUp { item: String },
    ItemMovedDown { item: String },
    ItemNameChanged { item: String, old_name: String },
    ItemStepsChanged { item: String },
    VariableAdded { name: String },
    VariableMovedUp { name: String },
    VariableMovedDown { name: String },
    VariableRemoved { name: String },
    VariableUpdated { name: String },
    UserKeywordAdded { name: String },
    UserKeywordRemoved { name: String },
    TestCaseAdded { name: String },
    TestCaseRemoved { name: String },
    ImportSettingAdded { name: String },
    ImportSettingChanged { name: String },
    ImportSettingRemoved { name: String },
    ExcludesChanged,
    NewProject { path: PathBuf },
    OpenSuite { path: PathBuf },
    OpenResource { path: PathBuf },
    FileNameChanged { path: PathBuf, old_basename: String },
    ModificationPrevented { item: String },
    InputValidationError { message: String },
    SettingsChanged { key: String },
    TestExecutionStarted,
    TestRunning { name: String },
    TestPaused,
    TestPassed { name: String },
    TestFailed { name: String, message: String },
    TestStopped { name: String },
    TestSkipped { name: String },
    RunnerStarted,
    RunnerStopped,
    Log { message: String },
    LogException { message: String },
    ParserLog { message: String },
    TreeAwarePluginAdded { name: String },
    OpenVariableDialog { item: String },
    ExecuteSpecXmlImport,
    Closing,
}

impl RideMessage {
    /// The dotted topic this message publishes on.
    pub fn topic(&self) -> &'static str {
        match self {
            RideMessage::TreeSelection { .. } => "ride.tree.selection",
            RideMessage::BeforeSaving { .. } => "ride.before.saving",
            RideMessage::Saved { .. } => "ride.saved",
            RideMessage::SaveAll => "ride.save.all",
            RideMessage::DataChangedToDirty { .. } => "ride.data.changed.to.dirty",
            RideMessage::DataDirtyCleared { .. } => "ride.data.dirty.cleared",
            RideMessage::DataFileSet { .. } => "ride.data.file.set",
            RideMessage::ItemMovedUp { .. } => "ride.item.moved.up",
            RideMessage::ItemMovedDown { .. } => "ride.item.moved.down",
            RideMessage::ItemNameChanged { .. } => "ride.item.name.changed",
            RideMessage::ItemStepsChanged { .. } => "ride.item.steps.changed",
            RideMessage::VariableAdded { .. } => "ride.variable.added",
            RideMessage::VariableMovedUp { .. } => "ride.variable.moved.up",
            RideMessage::VariableMovedDown { .. } => "ride.variable.moved.down",
            RideMessage::VariableRemoved { .. } => "ride.variable.removed",
            RideMessage::VariableUpdated { .. } => "ride.variable.updated",
            RideMessage::UserKeywordAdded { .. } => "ride.user.keyword.added",
            RideMessage::UserKeywordRemoved { .. } => "ride.user.keyword.removed",
            RideMessage::TestCaseAdded { .. } => "ride.test.case.added",
            RideMessage::TestCaseRemoved { .. } => "ride.test.case.removed",
            RideMessage::ImportSettingAdded { .. } => "ride.import.setting.added",
            RideMessage::ImportSettingChanged { .. } => "ride.import.setting.changed",
            RideMessage::ImportSettingRemoved { .. } => "ride.import.setting.removed",
            RideMessage::ExcludesChanged => "ride.excludes.changed",
            RideMessage::NewProject { .. } => "ride.new.project",
            RideMessage::OpenSuite { .. } => "ride.open.suite",
            RideMessage::OpenResource { .. } => "ride.open.resource",
            RideMessage::FileNameChanged { .. } => "ride.file.name.changed",
            RideMessage::ModificationPrevented { .. } => "ride.modification.prevented",
            RideMessage::InputValidationError { .. } => "ride.input.validation.error",
            RideMessage::SettingsChanged { .. } => "ride.settings.changed",
            RideMessage::TestExecutionStarted => "ride.test.execution.started",
            RideMessage::TestRunning { .. } => "ride.test.running",
            RideMessage::TestPaused => "ride.test.paused",
            RideMessage::TestPassed { .. } => "ride.test.passed",
            RideMessage::TestFailed { .. } => "ride.test.failed",
            RideMessage::TestStopped { .. } => "ride.test.stopped",
            RideMessage::TestSkipped { .. } => "ride.test.skipped",
            RideMessage::RunnerStarted => "ride.runner.started",
            RideMessage::RunnerStopped => "ride.runner.stopped",
            RideMessage::Log { .. } => "ride.log",
            RideMessage::LogException { .. } => "ride.log.exception",
            RideMessage::ParserLog { .. } => "ride.parser.log",
            RideMessage::TreeAwarePluginAdded { .. } => "ride.tree.aware.plugin.added",
            RideMessage::OpenVariableDialog { .. } => "ride.open.variable.dialog",
            RideMessage::ExecuteSpecXmlImport => "ride.execute.spec.xml.import",
            RideMessage::Closing => "ride.closing",
        }
    }
}

pub type Listener = Box<dyn Fn(&RideMessage) -> anyhow::Result<()>>;

/// Handle returned by [`Publisher::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

struct Subscription {
    id: ListenerId,
    topic: String,
    listener: Listener,
}

/// Topic-prefix message bus.
///
/// Interior mutability lets components publish through a shared reference.
/// Subscribing or unsubscribing from inside a listener is not supported;
/// the subscription list is borrowed for the whole delivery.
#[derive(Default)]
pub struct Publisher {
    subscriptions: RefCell<Vec<Subscription>>,
    next_id: RefCell<u64>,
}

impl Publisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `topic` and every topic below it.
    pub fn subscribe(&self, topic: impl Into<String>, listener: Listener) -> ListenerId {
        let mut next = self.next_id.borrow_mut();
        let id = ListenerId(*next);
        *next += 1;
        self.subscriptions.borrow_mut().push(Subscription {
            id,
            topic: topic.into(),
            listener,
        });
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) {
        self.subscriptions.borrow_mut().retain(|s| s.id != id);
    }

    /// Deliver `message` to every matching listener, in subscription order.
    pub fn publish(&self, message: &RideMessage) {
        let topic = message.topic();
        let subscriptions = self.subscriptions.borrow();
        for sub in subscriptions.iter() {
            if !topic_matches(&sub.topic, topic) {
                continue;
            }
            if let Err(err) = (sub.listener)(message) {
                tracing::error!(topic, %err, "listener failed, aborting delivery");
                break;
            }
        }
    }
}

fn topic_matches(subscribed: &str, published: &str) -> bool {
    published == subscribed
        || published
            .strip_prefix(subscribed)
            .is_some_and(|rest| rest.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    fn collect_into(log: &Rc<RefCell<Vec<String>>>) -> Listener {
        let log = Rc::clone(log);
        Box::new(move |msg| {
            log.borrow_mut().push(msg.topic().to_string());
            Ok(())
        })
    }

    #[test]
    fn exact_topic_receives_message() {
        let bus = Publisher::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        bus.subscribe("ride.saved", collect_into(&log));
        bus.publish(&RideMessage::Saved {
            path: PathBuf::from("/s.robot"),
        });
        assert_eq!(*log.borrow(), vec!["ride.saved"]);
    }

    #[test]
    fn prefix_subscription_receives_subtopics() {
        let bus = Publisher::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        bus.subscribe("ride.test", collect_into(&log));
        bus.publish(&RideMessage::TestPassed { name: "t".into() });
        bus.publish(&RideMessage::TestExecutionStarted);
        bus.publish(&RideMessage::Saved {
            path: PathBuf::from("/s.robot"),
        });
        assert_eq!(
            *log.borrow(),
            vec!["ride.test.passed", "ride.test.execution.started"]
        );
    }

    #[test]
    fn prefix_matching_is_segment_aware() {
        assert!(topic_matches("ride.test", "ride.test.passed"));
        assert!(topic_matches("ride", "ride.saved"));
        assert!(!topic_matches("ride.test", "ride.testing"));
        assert!(!topic_matches("ride.test.passed", "ride.test"));
    }

    #[test]
    fn save_topics_follow_the_variant_derivation() {
        let path = PathBuf::from("/s.robot");
        assert_eq!(
            RideMessage::BeforeSaving { path: path.clone() }.topic(),
            "ride.before.saving"
        );
        assert_eq!(RideMessage::Saved { path }.topic(), "ride.saved");
    }

    #[test]
    fn listener_error_aborts_remaining_listeners() {
        let bus = Publisher::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        bus.subscribe("ride", Box::new(|_| anyhow::bail!("boom")));
        bus.subscribe("ride", collect_into(&log));
        bus.publish(&RideMessage::Closing);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = Publisher::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let id = bus.subscribe("ride", collect_into(&log));
        bus.publish(&RideMessage::Closing);
        bus.unsubscribe(id);
        bus.publish(&RideMessage::Closing);
        assert_eq!(log.borrow().len(), 1);
    }
}
