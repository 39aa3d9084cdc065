mod common;

use common::*;
use mms_core::carrier::{
    BroadcastOutcome, BroadcastReply, CarrierAction, CarrierAppDelegate, CarrierAppRegistry,
    CarrierBroadcast, RequestFinalizer,
};
use mms_core::queue::RequestSink;
use mms_core::request::{Request, RequestKind};
use std::sync::{Arc, Mutex};

#[derive(Clone, Copy)]
enum ReplyMode {
    Answer(BroadcastOutcome),
    Hold,
    Drop,
}

struct FakeRegistry {
    packages: Vec<String>,
    mode: ReplyMode,
    broadcasts: Mutex<Vec<CarrierBroadcast>>,
    held: Mutex<Vec<BroadcastReply>>,
}

impl FakeRegistry {
    fn new(packages: &[&str], mode: ReplyMode) -> Arc<Self> {
        Arc::new(Self {
            packages: packages.iter().map(|package| package.to_string()).collect(),
            mode,
            broadcasts: Mutex::new(Vec::new()),
            held: Mutex::new(Vec::new()),
        })
    }

    fn broadcasts(&self) -> Vec<CarrierBroadcast> {
        self.broadcasts.lock().expect("broadcasts").clone()
    }

    fn answer_held(&self, outcome: BroadcastOutcome) {
        let replies: Vec<_> = self.held.lock().expect("held").drain(..).collect();
        for reply in replies {
            reply(outcome);
        }
    }
}

impl CarrierAppRegistry for FakeRegistry {
    fn carrier_packages(&self, _action: CarrierAction) -> Vec<String> {
        self.packages.clone()
    }

    fn send_ordered_broadcast(&self, broadcast: CarrierBroadcast, reply: BroadcastReply) {
        self.broadcasts.lock().expect("broadcasts").push(broadcast);
        match self.mode {
            ReplyMode::Answer(outcome) => reply(outcome),
            ReplyMode::Hold => self.held.lock().expect("held").push(reply),
            ReplyMode::Drop => drop(reply),
        }
    }
}

#[derive(Default)]
struct CountingSink {
    queued: Mutex<Vec<RequestKind>>,
}

impl CountingSink {
    fn queued(&self) -> Vec<RequestKind> {
        self.queued.lock().expect("queued").clone()
    }
}

impl RequestSink for CountingSink {
    fn enqueue(&self, request: Box<dyn Request>) {
        self.queued.lock().expect("queued").push(request.kind());
    }
}

#[derive(Default)]
struct RecordingFinalizer {
    finalized: Mutex<Vec<(RequestKind, Option<Vec<u8>>)>>,
}

impl RequestFinalizer for RecordingFinalizer {
    fn finalize(&self, request: Box<dyn Request>, response: Option<Vec<u8>>) {
        self.finalized.lock().expect("finalized").push((request.kind(), response));
    }
}

struct Fixture {
    registry: Arc<FakeRegistry>,
    sink: Arc<CountingSink>,
    finalizer: Arc<RecordingFinalizer>,
    delegate: CarrierAppDelegate,
}

fn fixture(packages: &[&str], mode: ReplyMode) -> Fixture {
    let registry = FakeRegistry::new(packages, mode);
    let sink = Arc::new(CountingSink::default());
    let finalizer = Arc::new(RecordingFinalizer::default());
    let delegate = CarrierAppDelegate::new(registry.clone(), sink.clone(), finalizer.clone());
    Fixture { registry, sink, finalizer, delegate }
}

fn claimed(message_ref: i32) -> ReplyMode {
    ReplyMode::Answer(BroadcastOutcome::Claimed { message_ref: Some(message_ref) })
}

#[test]
fn without_carrier_app_request_is_queued_once() {
    let fx = fixture(&[], ReplyMode::Hold);
    let target = Recorder::new();

    fx.delegate.offer(Box::new(send_request(&target, OTHER_APP)));

    assert_eq!(fx.sink.queued(), vec![RequestKind::Send]);
    assert!(fx.registry.broadcasts().is_empty());
    assert_eq!(fx.delegate.pending_len(), 0);
}

#[test]
fn ambiguous_carrier_apps_fall_back_to_queue() {
    let fx = fixture(&["com.carrier.one", "com.carrier.two"], ReplyMode::Hold);
    let target = Recorder::new();

    fx.delegate.offer(Box::new(download_request(&target, "http://mmsc.test/get/1")));

    assert_eq!(fx.sink.queued(), vec![RequestKind::Download]);
    assert!(fx.registry.broadcasts().is_empty());
}

#[test]
fn declined_broadcast_queues_request() {
    let fx = fixture(&["com.carrier"], ReplyMode::Answer(BroadcastOutcome::Declined));
    let target = Recorder::new();

    fx.delegate.offer(Box::new(
        send_request(&target, OTHER_APP).with_location_url("http://override.test/post"),
    ));

    let broadcasts = fx.registry.broadcasts();
    assert_eq!(broadcasts.len(), 1);
    assert_eq!(broadcasts[0].action, CarrierAction::Send);
    assert_eq!(broadcasts[0].package, "com.carrier");
    assert_eq!(broadcasts[0].content_locator.as_ref().map(|l| l.as_str()), Some(PDU_LOCATOR));
    assert_eq!(broadcasts[0].location_url.as_deref(), Some("http://override.test/post"));
    assert_eq!(fx.sink.queued(), vec![RequestKind::Send]);
}

#[test]
fn claimed_send_is_parked_until_carrier_reports_success() {
    let fx = fixture(&["com.carrier"], claimed(17));
    let target = Recorder::new();

    fx.delegate.offer(Box::new(send_request(&target, OTHER_APP)));
    assert_eq!(fx.delegate.pending_len(), 1);
    assert!(fx.sink.queued().is_empty());

    assert!(fx.delegate.complete_send(17, true));
    assert_eq!(fx.delegate.pending_len(), 0);
    assert_eq!(
        *fx.finalizer.finalized.lock().expect("finalized"),
        vec![(RequestKind::Send, None)]
    );
    assert!(fx.sink.queued().is_empty());

    assert!(!fx.delegate.complete_send(17, true));
}

#[test]
fn failed_carrier_send_falls_back_to_queue() {
    let fx = fixture(&["com.carrier"], claimed(3));
    let target = Recorder::new();

    fx.delegate.offer(Box::new(send_request(&target, OTHER_APP)));
    assert!(fx.delegate.complete_send(3, false));

    assert_eq!(fx.sink.queued(), vec![RequestKind::Send]);
    assert!(fx.finalizer.finalized.lock().expect("finalized").is_empty());
}

#[test]
fn carrier_download_delivers_pdu_or_falls_back() {
    let fx = fixture(&["com.carrier"], ReplyMode::Hold);
    let target = Recorder::new();

    fx.delegate.offer(Box::new(download_request(&target, "http://mmsc.test/get/1")));
    fx.registry.answer_held(BroadcastOutcome::Claimed { message_ref: Some(1) });
    fx.delegate.offer(Box::new(download_request(&target, "http://mmsc.test/get/2")));
    fx.registry.answer_held(BroadcastOutcome::Claimed { message_ref: Some(2) });
    assert_eq!(fx.delegate.pending_len(), 2);
    assert_eq!(fx.registry.broadcasts()[0].action, CarrierAction::Download);

    assert!(fx.delegate.complete_download(1, Some(RETRIEVE_CONF.to_vec())));
    assert!(fx.delegate.complete_download(2, None));

    assert_eq!(
        *fx.finalizer.finalized.lock().expect("finalized"),
        vec![(RequestKind::Download, Some(RETRIEVE_CONF.to_vec()))]
    );
    assert_eq!(fx.sink.queued(), vec![RequestKind::Download]);
    assert_eq!(fx.delegate.pending_len(), 0);
}

#[test]
fn claim_without_reference_is_sent_directly() {
    let fx = fixture(&["com.carrier"], ReplyMode::Answer(BroadcastOutcome::Claimed { message_ref: None }));
    let target = Recorder::new();

    fx.delegate.offer(Box::new(send_request(&target, OTHER_APP)));

    assert_eq!(fx.sink.queued(), vec![RequestKind::Send]);
    assert_eq!(fx.delegate.pending_len(), 0);
}

#[test]
fn dropped_reply_is_treated_as_decline() {
    let fx = fixture(&["com.carrier"], ReplyMode::Drop);
    let target = Recorder::new();

    fx.delegate.offer(Box::new(send_request(&target, OTHER_APP)));

    assert_eq!(fx.sink.queued(), vec![RequestKind::Send]);
}

#[test]
fn unknown_or_mismatched_reference_is_dropped_quietly() {
    let fx = fixture(&["com.carrier"], claimed(5));
    let target = Recorder::new();

    assert!(!fx.delegate.complete_send(99, true));
    assert!(!fx.delegate.complete_download(99, None));

    fx.delegate.offer(Box::new(send_request(&target, OTHER_APP)));
    assert!(!fx.delegate.complete_download(5, Some(vec![1])));
    assert_eq!(fx.delegate.pending_len(), 1);
    assert!(fx.sink.queued().is_empty());
}

#[test]
fn reused_reference_sends_the_displaced_request_directly() {
    let fx = fixture(&["com.carrier"], claimed(8));
    let target = Recorder::new();

    fx.delegate.offer(Box::new(send_request(&target, OTHER_APP)));
    fx.delegate.offer(Box::new(send_request(&target, OTHER_APP)));

    assert_eq!(fx.delegate.pending_len(), 1);
    assert_eq!(fx.sink.queued(), vec![RequestKind::Send]);
}
