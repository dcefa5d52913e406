use hookt_workflow::Message;
use tokio::sync::oneshot;

/// A message handed to one step.
///
/// In sync mode the delivery carries a claim that the step must resolve with
/// its verdict. Dropping an unresolved claim counts as "not claimed".
#[derive(Debug)]
pub(crate) struct Delivery {
  pub message: Message,
  claim: Option<oneshot::Sender<bool>>,
}

impl Delivery {
  pub fn broadcast(message: Message) -> Self {
    Self {
      message,
      claim: None,
    }
  }

  pub fn claimable(message: Message) -> (Self, oneshot::Receiver<bool>) {
    let (tx, rx) = oneshot::channel();
    (
      Self {
        message,
        claim: Some(tx),
      },
      rx,
    )
  }

  #[cfg(test)]
  pub fn is_claimable(&self) -> bool {
    self.claim.is_some()
  }

  /// Answers the claim, if any. Later calls are no-ops.
  pub fn resolve(&mut self, claimed: bool) {
    if let Some(claim) = self.claim.take() {
      let _ = claim.send(claimed);
    }
  }
}
