//! Message scheduler of an `event` plugin instance.
//!
//! Sources are multiplexed into one channel. Each step bound to the plugin owns
//! a slot: an unbounded queue plus a `done` token that the scheduler cancels
//! once the slot is stopped. A single loop reads the multiplexed channel and
//! stop notifications. In async mode the loop enqueues each message on every
//! active slot itself, so a slot sees messages in source order and a busy
//! slot never holds back the others. In sync mode every message gets its own
//! delivery task that offers it to the slots in creation order.

use std::sync::{Mutex, PoisonError};

use hookt_trace::{Scope, SharedObserver};
use hookt_workflow::{Message, PluginError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::config::Mode;
use super::delivery::Delivery;

const MUX_CAPACITY: usize = 16;

struct Slot {
  tx: mpsc::UnboundedSender<Delivery>,
  done: CancellationToken,
  active: bool,
}

/// State consumed when the bus starts.
struct Pending {
  slots: Vec<Slot>,
  stops: mpsc::UnboundedReceiver<usize>,
}

pub(crate) struct Bus {
  mode: Mode,
  scope: Scope,
  observer: SharedObserver,
  stop_tx: mpsc::UnboundedSender<usize>,
  pending: Mutex<Option<Pending>>,
}

impl Bus {
  pub fn new(mode: Mode, scope: Scope, observer: SharedObserver) -> Self {
    let (stop_tx, stops) = mpsc::unbounded_channel();
    Self {
      mode,
      scope,
      observer,
      stop_tx,
      pending: Mutex::new(Some(Pending {
        slots: Vec::new(),
        stops,
      })),
    }
  }

  /// Registers a new slot. Slots are offered messages in creation order.
  pub fn add_slot(&self) -> Result<SlotHandle, PluginError> {
    let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
    let pending = pending
      .as_mut()
      .ok_or_else(|| PluginError::init("event bus already started"))?;

    let (tx, rx) = mpsc::unbounded_channel();
    let done = CancellationToken::new();
    let index = pending.slots.len();
    pending.slots.push(Slot {
      tx,
      done: done.clone(),
      active: true,
    });

    Ok(SlotHandle {
      index,
      rx: tokio::sync::Mutex::new(rx),
      done,
      stop_tx: self.stop_tx.clone(),
      scope: self.scope.clone(),
      observer: self.observer.clone(),
    })
  }

  /// Forwards every source into the multiplexed channel and spawns the
  /// scheduling loop. The loop ends on `cancel`, or once every source has
  /// closed and every slot has stopped.
  pub fn start(
    &self,
    sources: Vec<mpsc::Receiver<Message>>,
    cancel: CancellationToken,
  ) -> Result<(), PluginError> {
    let pending = self
      .pending
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .take()
      .ok_or_else(|| PluginError::init("event bus already started"))?;

    let (mux_tx, mux) = mpsc::channel(MUX_CAPACITY);
    for source in sources {
      tokio::spawn(forward(source, mux_tx.clone(), cancel.clone()));
    }
    drop(mux_tx);

    let scheduler = Scheduler {
      mode: self.mode,
      slots: pending.slots,
      stops: pending.stops,
      mux,
      cancel,
      scope: self.scope.clone(),
      observer: self.observer.clone(),
    };
    tokio::spawn(scheduler.run());
    Ok(())
  }
}

async fn forward(
  mut source: mpsc::Receiver<Message>,
  mux: mpsc::Sender<Message>,
  cancel: CancellationToken,
) {
  loop {
    let message = tokio::select! {
      _ = cancel.cancelled() => return,
      message = source.recv() => message,
    };
    let Some(message) = message else {
      return;
    };
    tokio::select! {
      _ = cancel.cancelled() => return,
      sent = mux.send(message) => if sent.is_err() { return },
    }
  }
}

/// A slot as seen by the step that owns it.
pub(crate) struct SlotHandle {
  index: usize,
  rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Delivery>>,
  done: CancellationToken,
  stop_tx: mpsc::UnboundedSender<usize>,
  scope: Scope,
  observer: SharedObserver,
}

impl SlotHandle {
  pub fn index(&self) -> usize {
    self.index
  }

  pub fn receiver(&self) -> &tokio::sync::Mutex<mpsc::UnboundedReceiver<Delivery>> {
    &self.rx
  }

  /// Announces that the slot is stopping and answers every delivery still
  /// arriving with "not claimed" until the scheduler confirms.
  pub async fn stop(&self) {
    self.observer.before_stop(&self.scope, self.index);
    // The scheduler is gone when this fails; its exit cancels `done`.
    let _ = self.stop_tx.send(self.index);

    let mut rx = self.rx.lock().await;
    loop {
      tokio::select! {
        _ = self.done.cancelled() => break,
        delivery = rx.recv() => match delivery {
          Some(mut delivery) => delivery.resolve(false),
          None => break,
        },
      }
    }
    self.observer.drain(&self.scope, self.index);
  }

  #[cfg(test)]
  pub fn is_done(&self) -> bool {
    self.done.is_cancelled()
  }
}

/// Snapshot of an active slot taken when a message is dispatched.
struct Target {
  index: usize,
  tx: mpsc::UnboundedSender<Delivery>,
  done: CancellationToken,
}

struct Scheduler {
  mode: Mode,
  slots: Vec<Slot>,
  stops: mpsc::UnboundedReceiver<usize>,
  mux: mpsc::Receiver<Message>,
  cancel: CancellationToken,
  scope: Scope,
  observer: SharedObserver,
}

impl Scheduler {
  async fn run(mut self) {
    let mut mux_open = true;
    loop {
      if !mux_open && self.slots.iter().all(|s| !s.active) {
        break;
      }
      tokio::select! {
        _ = self.cancel.cancelled() => break,
        Some(index) = self.stops.recv() => self.stop(index),
        message = self.mux.recv(), if mux_open => match message {
          Some(message) => self.dispatch(message),
          None => {
            debug!("event sources closed");
            mux_open = false;
          }
        },
      }
    }

    for slot in &self.slots {
      slot.done.cancel();
    }
    debug!("event scheduler finished");
  }

  fn stop(&mut self, index: usize) {
    let Some(slot) = self.slots.get_mut(index) else {
      return;
    };
    if slot.active {
      slot.active = false;
      slot.done.cancel();
      self.observer.stop(&self.scope, index);
    }
  }

  fn dispatch(&self, message: Message) {
    let seq = message.index();
    trace!(seq, "dispatching message");
    self.observer.before_demux(&self.scope, seq);

    match self.mode {
      Mode::Async => {
        broadcast(&self.scope, &self.observer, &message, &self.slots);
        self.observer.demux(&self.scope, seq);
      }
      Mode::Sync => {
        let targets: Vec<Target> = self
          .slots
          .iter()
          .enumerate()
          .filter(|(_, slot)| slot.active)
          .map(|(index, slot)| Target {
            index,
            tx: slot.tx.clone(),
            done: slot.done.clone(),
          })
          .collect();
        let scope = self.scope.clone();
        let observer = self.observer.clone();
        tokio::spawn(async move {
          claim(&scope, &observer, message, targets).await;
          observer.demux(&scope, seq);
        });
      }
    }
  }
}

/// Enqueues `message` on every active slot. Slots stopped in the meantime are
/// skipped.
fn broadcast(scope: &Scope, observer: &SharedObserver, message: &Message, slots: &[Slot]) {
  let seq = message.index();
  for (index, slot) in slots.iter().enumerate() {
    if !slot.active || slot.done.is_cancelled() {
      continue;
    }
    observer.before_mux(scope, seq, index);
    if slot.tx.send(Delivery::broadcast(message.clone())).is_ok() {
      observer.mux(scope, seq, index);
    }
  }
}

/// Offers `message` to each target in order until one claims it.
async fn claim(scope: &Scope, observer: &SharedObserver, message: Message, targets: Vec<Target>) {
  let seq = message.index();
  for target in targets {
    if target.done.is_cancelled() {
      continue;
    }
    let (delivery, verdict) = Delivery::claimable(message.clone());

    observer.before_mux(scope, seq, target.index);
    if target.tx.send(delivery).is_err() {
      continue;
    }
    observer.mux(scope, seq, target.index);

    let claimed = tokio::select! {
      verdict = verdict => verdict.unwrap_or(false),
      _ = target.done.cancelled() => false,
    };
    observer.wait(scope, seq, target.index, claimed);

    if claimed {
      observer.done(scope, seq, target.index);
      return;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  use serde_json::json;
  use tokio::time::timeout;

  fn bus(mode: Mode) -> Bus {
    Bus::new(mode, Scope::new().job("j"), hookt_trace::noop())
  }

  async fn next(slot: &SlotHandle) -> Option<Delivery> {
    let mut rx = slot.receiver().lock().await;
    timeout(Duration::from_millis(100), rx.recv()).await.ok().flatten()
  }

  #[tokio::test]
  async fn test_async_broadcasts_to_every_slot() {
    let bus = bus(Mode::Async);
    let slots: Vec<_> = (0..3).map(|_| bus.add_slot().unwrap()).collect();
    let (tx, rx) = mpsc::channel(4);
    bus.start(vec![rx], CancellationToken::new()).unwrap();

    tx.send(Message::new(0, json!({"v": 1}))).await.unwrap();

    for slot in &slots {
      let delivery = next(slot).await.unwrap();
      assert_eq!(delivery.message.payload(), &json!({"v": 1}));
      assert!(!delivery.is_claimable());
    }
  }

  #[tokio::test]
  async fn test_async_preserves_order_per_slot() {
    let bus = bus(Mode::Async);
    let slot = bus.add_slot().unwrap();
    let (tx, rx) = mpsc::channel(8);
    bus.start(vec![rx], CancellationToken::new()).unwrap();

    for i in 0..5 {
      tx.send(Message::new(i, json!(i))).await.unwrap();
    }
    for i in 0..5 {
      assert_eq!(next(&slot).await.unwrap().message.index(), i);
    }
  }

  #[tokio::test]
  async fn test_busy_slot_does_not_hold_back_others() {
    let bus = bus(Mode::Async);
    let busy = bus.add_slot().unwrap();
    let idle = bus.add_slot().unwrap();
    let (tx, rx) = mpsc::channel(8);
    bus.start(vec![rx], CancellationToken::new()).unwrap();

    for i in 0..4 {
      tx.send(Message::new(i, json!(i))).await.unwrap();
    }
    for i in 0..4 {
      assert_eq!(next(&idle).await.unwrap().message.index(), i);
    }
    assert_eq!(next(&busy).await.unwrap().message.index(), 0);
  }

  #[tokio::test]
  async fn test_sync_messages_are_offered_independently() {
    let bus = bus(Mode::Sync);
    let slot = bus.add_slot().unwrap();
    let (tx, rx) = mpsc::channel(4);
    bus.start(vec![rx], CancellationToken::new()).unwrap();

    tx.send(Message::new(0, json!({}))).await.unwrap();
    tx.send(Message::new(1, json!({}))).await.unwrap();

    // The first claim stays open while the second message arrives.
    let mut first = next(&slot).await.unwrap();
    let mut second = next(&slot).await.unwrap();
    assert_eq!(first.message.index() + second.message.index(), 1);
    first.resolve(false);
    second.resolve(true);
  }

  #[tokio::test]
  async fn test_sync_stops_at_first_claim() {
    let bus = bus(Mode::Sync);
    let slots: Vec<_> = (0..3).map(|_| bus.add_slot().unwrap()).collect();
    let (tx, rx) = mpsc::channel(4);
    bus.start(vec![rx], CancellationToken::new()).unwrap();

    tx.send(Message::new(0, json!({}))).await.unwrap();

    let mut first = next(&slots[0]).await.unwrap();
    assert!(first.is_claimable());
    first.resolve(false);

    let mut second = next(&slots[1]).await.unwrap();
    second.resolve(true);

    assert!(next(&slots[2]).await.is_none());
  }

  #[tokio::test]
  async fn test_sync_dropped_claim_moves_on() {
    let bus = bus(Mode::Sync);
    let slots: Vec<_> = (0..2).map(|_| bus.add_slot().unwrap()).collect();
    let (tx, rx) = mpsc::channel(4);
    bus.start(vec![rx], CancellationToken::new()).unwrap();

    tx.send(Message::new(0, json!({}))).await.unwrap();
    drop(next(&slots[0]).await.unwrap());

    let delivery = next(&slots[1]).await.unwrap();
    assert_eq!(delivery.message.index(), 0);
  }

  #[tokio::test]
  async fn test_stopped_slot_is_skipped() {
    let bus = bus(Mode::Sync);
    let slots: Vec<_> = (0..2).map(|_| bus.add_slot().unwrap()).collect();
    let (tx, rx) = mpsc::channel(4);
    bus.start(vec![rx], CancellationToken::new()).unwrap();

    slots[0].stop().await;
    assert!(slots[0].is_done());

    tx.send(Message::new(0, json!({}))).await.unwrap();
    let mut delivery = next(&slots[1]).await.unwrap();
    delivery.resolve(true);
  }

  #[tokio::test]
  async fn test_stop_drains_pending_delivery() {
    let bus = bus(Mode::Sync);
    let slots: Vec<_> = (0..2).map(|_| bus.add_slot().unwrap()).collect();
    let (tx, rx) = mpsc::channel(4);
    bus.start(vec![rx], CancellationToken::new()).unwrap();

    // Slot 0 never reads; its stop must release the claim.
    tx.send(Message::new(0, json!({}))).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    slots[0].stop().await;

    assert!(next(&slots[1]).await.is_some());
  }

  #[tokio::test]
  async fn test_closed_sources_and_stopped_slots_end_scheduler() {
    let bus = bus(Mode::Async);
    let slot = bus.add_slot().unwrap();
    let (tx, rx) = mpsc::channel::<Message>(1);
    bus.start(vec![rx], CancellationToken::new()).unwrap();
    drop(tx);

    timeout(Duration::from_secs(1), slot.stop()).await.unwrap();
    assert!(slot.is_done());
  }

  #[tokio::test]
  async fn test_cancel_releases_slots() {
    let bus = bus(Mode::Async);
    let slot = bus.add_slot().unwrap();
    let (_tx, rx) = mpsc::channel::<Message>(1);
    let cancel = CancellationToken::new();
    bus.start(vec![rx], cancel.clone()).unwrap();

    cancel.cancel();
    timeout(Duration::from_secs(1), slot.stop()).await.unwrap();
  }

  #[tokio::test]
  async fn test_slots_after_start_are_rejected() {
    let bus = bus(Mode::Async);
    bus.start(Vec::new(), CancellationToken::new()).unwrap();
    assert!(bus.add_slot().is_err());
    assert!(bus.start(Vec::new(), CancellationToken::new()).is_err());
  }
}
