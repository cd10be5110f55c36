//! Browser bootstrap script.
//!
//! The script opens the reload channel, reconnects after failures with a
//! fixed delay, gives up after a bounded number of consecutive failures and
//! reloads the page when a `reload` message arrives.
//!
//! [`ClientState`] models the script's state machine; the JavaScript below
//! follows it transition for transition.

use std::time::Duration;

use super::transport::Transport;

/// Opening of the injected `<script>` element, matched case-insensitively.
pub(crate) const SCRIPT_OPEN: &str = "<script data-hotpage-reload";

/// Query answered `204` at once by the poll transport.
pub(crate) const ACK_QUERY: &str = "ack";

const PUSH_CONNECT: &str = r"
    function connect() {
      state = 'connecting';
      var source = new EventSource(endpoint);
      source.onmessage = function (event) {
        if (event.data === 'connected') {
          opened();
        } else if (event.data === 'reload') {
          source.close();
          reload();
        }
      };
      source.onerror = function () {
        source.close();
        lost();
      };
    }";

const POLL_CONNECT: &str = r"
    function connect() {
      state = 'connecting';
      fetch(endpoint + '?__ACK__', { cache: 'no-store' })
        .then(function (response) {
          if (response.status === 204) {
            opened();
            hold();
          } else {
            lost();
          }
        })
        .catch(lost);
    }

    function hold() {
      fetch(endpoint, { cache: 'no-store' })
        .then(function (response) {
          if (response.status === 200) {
            reload();
          } else if (response.status === 204) {
            hold();
          } else {
            lost();
          }
        })
        .catch(lost);
    }";

const SCRIPT_TEMPLATE: &str = r"
<script data-hotpage-reload>
  (function () {
    var endpoint = '__ENDPOINT__';
    var retryDelay = __RETRY_DELAY__;
    var maxRetries = __MAX_RETRIES__;
    var failures = 0;
    var state = 'disconnected';

    function opened() {
      state = 'connected';
      failures = 0;
    }

    function reload() {
      state = 'reloading';
      location.reload();
    }

    function lost() {
      if (state === 'stopped' || state === 'reloading') {
        return;
      }
      failures += 1;
      if (failures >= maxRetries) {
        state = 'stopped';
        console.log('[hotpage] Live reload stopped after ' + failures + ' failed attempts');
        return;
      }
      state = 'disconnected';
      console.log('[hotpage] Connection lost, reconnecting...');
      setTimeout(connect, retryDelay);
    }
__CONNECT__

    connect();
  })();
</script>
";

/// Settings baked into the bootstrap script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootstrapConfig {
    /// Reload endpoint path.
    pub endpoint: String,
    /// Channel transport.
    pub transport: Transport,
    /// Delay before reconnecting after a failure.
    pub retry_delay: Duration,
    /// Consecutive failures after which the script stops reconnecting.
    pub max_retries: u32,
}

impl BootstrapConfig {
    /// Render the `<script>` element injected into HTML documents.
    pub fn render(&self) -> String {
        let connect = match self.transport {
            Transport::Push => PUSH_CONNECT,
            Transport::Poll => POLL_CONNECT,
        };

        SCRIPT_TEMPLATE
            .replace("__ENDPOINT__", &self.endpoint)
            .replace("__RETRY_DELAY__", &self.retry_delay.as_millis().to_string())
            .replace("__MAX_RETRIES__", &self.max_retries.to_string())
            .replace("__CONNECT__", connect)
            .replace("__ACK__", ACK_QUERY)
    }
}

/// Inputs to the bootstrap state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    /// A connection attempt starts (initially or after the retry delay).
    Connect,
    /// The server confirmed the channel (`connected` frame or the poll
    /// acknowledgment).
    Acknowledged,
    /// A `reload` message (push) or `200` answer (poll) arrived.
    Reload,
    /// The channel failed or closed.
    ChannelError,
}

/// Bootstrap script states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientState {
    /// Waiting for the retry delay, with the consecutive failure count.
    Disconnected {
        /// Consecutive failed attempts so far.
        failures: u32,
    },
    /// Attempt in flight.
    Connecting {
        /// Consecutive failed attempts so far.
        failures: u32,
    },
    /// Channel live.
    Connected,
    /// Navigating away; terminal.
    Reloading,
    /// Gave up reconnecting; terminal, the page is left as is.
    Stopped {
        /// Consecutive failed attempts.
        failures: u32,
    },
}

impl ClientState {
    /// Initial state on page load.
    pub const INITIAL: Self = Self::Disconnected { failures: 0 };

    /// Apply one event.
    #[must_use]
    pub fn on(self, event: ClientEvent, max_retries: u32) -> Self {
        match (self, event) {
            (Self::Disconnected { failures }, ClientEvent::Connect) => Self::Connecting { failures },
            (Self::Connecting { .. } | Self::Connected, ClientEvent::Acknowledged) => Self::Connected,
            (Self::Connecting { .. } | Self::Connected, ClientEvent::Reload) => Self::Reloading,
            (Self::Connecting { failures }, ClientEvent::ChannelError) => {
                Self::after_failure(failures + 1, max_retries)
            }
            (Self::Connected, ClientEvent::ChannelError) => Self::after_failure(1, max_retries),
            (state, _) => state,
        }
    }

    fn after_failure(failures: u32, max_retries: u32) -> Self {
        if failures >= max_retries {
            Self::Stopped { failures }
        } else {
            Self::Disconnected { failures }
        }
    }

    /// Returns true once the script will never act again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Reloading | Self::Stopped { .. })
    }
}
