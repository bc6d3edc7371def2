use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use log::{debug, error, info};
use crate::ContingencyFoot;

/// Public API for the contingency backend - owns the task
pub struct ContingencyBackend
{   hand: crate::ContingencyHand
  , _task_handle: tokio::task::JoinHandle<()>
}

impl ContingencyBackend
{   /// Create and spawn a new contingency backend
    /// Returns immediately - spawns background task
    pub fn new(
      orchestrator: Arc<crate::FailoverOrchestrator>
    , stats: Arc<crate::ContingencyStats>
    ) -> Self
    {   debug!("Creating ContingencyBackend with task ownership");

        let (generate_tx, generate_rx)
          = mpsc::unbounded_channel();
        let (reload_tx, reload_rx)
          = mpsc::unbounded_channel();
        let (stats_tx, stats_rx)
          = mpsc::unbounded_channel();
        let (test_provider_tx, test_provider_rx)
          = mpsc::unbounded_channel();
        let (kill_process_tx, kill_process_rx)
          = mpsc::unbounded_channel();

        let hand = crate::ContingencyHand
        {   generate_tx
          , reload_tx
          , stats_tx
          , test_provider_tx
          , kill_process_tx
        };

        let foot = crate::ContingencyFoot
        {   generate_rx
          , reload_rx
          , stats_rx
          , test_provider_rx
          , kill_process_rx
        };

        let _task_handle = tokio::spawn(async move {
          run_backend_loop(foot, orchestrator, stats).await
        });

        ContingencyBackend
        {   hand
          , _task_handle
        }
    }

    /// Queue a generation request - returns almost immediately
    pub fn generate(
      &self
    , request: crate::GenerationRequest
    , preferred_provider: Option<String>
    ) -> Result<
        mpsc::UnboundedReceiver<crate::GenerateReply>,
        crate::error::Error
      >
    {   self.generate_with_cancel(
          request
        , preferred_provider
        , CancellationToken::new()
        )
    }

    /// Queue a generation request the caller can abandon through
    /// `cancel`
    pub fn generate_with_cancel(
      &self
    , request: crate::GenerationRequest
    , preferred_provider: Option<String>
    , cancel: CancellationToken
    ) -> Result<
        mpsc::UnboundedReceiver<crate::GenerateReply>,
        crate::error::Error
      >
    {   debug!("generate queuing command, preferred: {:?}", preferred_provider);
        let (reply_tx, reply_rx)
          = mpsc::unbounded_channel();

        let cmd = crate::GenerateArgs
        {   request
          , preferred_provider
          , cancel
          , reply: reply_tx
        };

        self.hand.generate_tx
          .send(cmd)
          .map_err(|_| disconnected())?;

        Ok(reply_rx)
    }

    /// Queue a configuration reload - returns almost immediately
    pub fn reload_configuration(
      &self
    ) -> Result<
        mpsc::UnboundedReceiver<crate::ReloadReply>,
        crate::error::Error
      >
    {   debug!("reload_configuration queuing command");
        let (reply_tx, reply_rx)
          = mpsc::unbounded_channel();

        self.hand.reload_tx
          .send(crate::ReloadArgs { reply: reply_tx })
          .map_err(|_| disconnected())?;

        Ok(reply_rx)
    }

    /// Queue a stats request - returns almost immediately
    pub fn get_contingency_stats(
      &self
    , window_days: u32
    ) -> Result<
        mpsc::UnboundedReceiver<crate::StatsReply>,
        crate::error::Error
      >
    {   debug!("get_contingency_stats queuing for {} days", window_days);
        let (reply_tx, reply_rx)
          = mpsc::unbounded_channel();

        let cmd = crate::StatsArgs
        {   window_days
          , reply: reply_tx
        };

        self.hand.stats_tx
          .send(cmd)
          .map_err(|_| disconnected())?;

        Ok(reply_rx)
    }

    /// Queue a provider connectivity check - returns almost immediately
    pub fn test_provider(
      &self
    , provider_key: String
    ) -> Result<
        mpsc::UnboundedReceiver<crate::TestProviderReply>,
        crate::error::Error
      >
    {   debug!("test_provider queuing for {}", provider_key);
        let (reply_tx, reply_rx)
          = mpsc::unbounded_channel();

        let cmd = crate::TestProviderArgs
        {   provider_key
          , reply: reply_tx
        };

        self.hand.test_provider_tx
          .send(cmd)
          .map_err(|_| disconnected())?;

        Ok(reply_rx)
    }

    /// Gracefully shutdown the backend
    pub async fn shutdown(self)
      -> Result<(), crate::error::Error>
    {   debug!("Shutting down ContingencyBackend");
        let (reply_tx, mut reply_rx)
          = mpsc::unbounded_channel();

        self.hand.kill_process_tx
          .send(crate::KillProcessArgs { reply: reply_tx })
          .map_err(|_| {
            error!("Backend channel already closed");
            crate::error::Error::Other(
              "Backend already shutdown".to_string()
            )
          })?;

        // Wait for shutdown confirmation
        if let Some(result) = reply_rx.recv().await
        {   debug!("Backend shutdown confirmed");
            result
        } else
        {   error!("Backend shutdown not confirmed");
            Err(crate::error::Error::Other(
              "Backend stopped without confirming shutdown".to_string()
            ))
        }
    }
}

fn disconnected() -> crate::error::Error
{   error!("Backend channel closed");
    crate::error::Error::Other(
      "Backend disconnected".to_string()
    )
}

/// Main backend event loop
///
/// tokio::select! is only for fast queueing. Every unit of work is
/// spawned onto its own task, so a slow provider or a retry delay in
/// one request never holds up another.
async fn run_backend_loop(
  foot: crate::ContingencyFoot
, orchestrator: Arc<crate::FailoverOrchestrator>
, stats: Arc<crate::ContingencyStats>
)
{   debug!("Starting ContingencyBackend event loop");
    let ContingencyFoot
    {   mut generate_rx
      , mut reload_rx
      , mut stats_rx
      , mut test_provider_rx
      , mut kill_process_rx
    } = foot;

    loop
    { tokio::select!
      { Some(cmd) = generate_rx.recv() => {
          debug!("Received Generate");
          let orchestrator = Arc::clone(&orchestrator);
          tokio::spawn(async move {
            let result = orchestrator
              .execute_with_cancel(
                cmd.request,
                cmd.preferred_provider.as_deref(),
                &cmd.cancel
              )
              .await;
            let _ = cmd.reply.send(result);
          });
        }
      , Some(cmd) = reload_rx.recv() => {
          debug!("Received ReloadConfiguration");
          let orchestrator = Arc::clone(&orchestrator);
          tokio::spawn(async move {
            let result = orchestrator.reload_configuration().await;
            let _ = cmd.reply.send(result);
          });
        }
      , Some(cmd) = stats_rx.recv() => {
          debug!("Received GetContingencyStats");
          let stats = Arc::clone(&stats);
          tokio::spawn(async move {
            let summary = stats.summarize(cmd.window_days).await;
            let _ = cmd.reply.send(summary);
          });
        }
      , Some(cmd) = test_provider_rx.recv() => {
          debug!("Received TestProvider for {}", cmd.provider_key);
          let orchestrator = Arc::clone(&orchestrator);
          tokio::spawn(async move {
            let check = orchestrator
              .test_provider(&cmd.provider_key)
              .await;
            let _ = cmd.reply.send(check);
          });
        }
      , Some(cmd) = kill_process_rx.recv() => {
          debug!("Received KillProcess");
          let _ = cmd.reply.send(Ok(()));
          info!("ContingencyBackend shutting down");
          break;
        }
      , else => {
          debug!("All command channels closed");
          break;
        }
      }
    }
}
