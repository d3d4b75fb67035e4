use imap::ConnectionMode;
use tracing::info;

use crate::client::Client;
use crate::config::Config;
use crate::error::Result;

/// A convenience builder for [`Client`]s talking to an IMAP server.
///
/// Connecting over plaintext to the default folder (`INBOX`):
/// ```no_run
/// # use imap_ingest::ClientBuilder;
/// # fn main() -> imap_ingest::Result<()> {
/// let client = ClientBuilder::new("imap.example.com", 143).connect("user", "password")?;
/// # Ok(())
/// # }
/// ```
///
/// Over TLS, opening another folder read-only:
/// ```no_run
/// # use imap_ingest::{ClientBuilder, Config};
/// # fn main() -> imap_ingest::Result<()> {
/// let config = Config::default()
///     .with_tls(true)
///     .with_folder("Archive")
///     .with_read_only(true);
/// let client = ClientBuilder::new("imap.example.com", 993)
///     .config(config)
///     .connect("user", "password")?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder<D>
where
    D: AsRef<str>,
{
    domain: D,
    port: u16,
    config: Config,
}

impl<D> ClientBuilder<D>
where
    D: AsRef<str>,
{
    /// Make a new `ClientBuilder` using the given domain and port.
    pub fn new(domain: D, port: u16) -> Self {
        ClientBuilder {
            domain,
            port,
            config: Config::default(),
        }
    }

    /// Use `config` instead of [`Config::default`].
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Connect, log in as `username`, and open the configured folder.
    ///
    /// The folder is opened with `EXAMINE` when [`Config::read_only`] is set, and with `SELECT`
    /// otherwise.
    pub fn connect(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Client<imap::Session<imap::Connection>>> {
        let domain = self.domain.as_ref();
        info!(domain, port = self.port, tls = self.config.tls, "connecting");
        let client = imap::ClientBuilder::new(domain, self.port)
            .mode(connection_mode(self.config.tls)?)
            .connect()?;

        let mut session = client.login(username, password).map_err(|(e, _)| e)?;
        let mailbox = if self.config.read_only {
            session.examine(&self.config.folder)?
        } else {
            session.select(&self.config.folder)?
        };
        info!(
            folder = %self.config.folder,
            read_only = self.config.read_only,
            exists = mailbox.exists,
            "mailbox opened"
        );

        Ok(Client::new(session, self.config.clone()))
    }
}

#[cfg(any(feature = "native-tls", feature = "rustls-tls"))]
fn connection_mode(tls: bool) -> Result<ConnectionMode> {
    Ok(if tls {
        ConnectionMode::Tls
    } else {
        ConnectionMode::Plaintext
    })
}

#[cfg(not(any(feature = "native-tls", feature = "rustls-tls")))]
fn connection_mode(tls: bool) -> Result<ConnectionMode> {
    if tls {
        return Err(crate::error::Error::TlsUnavailable);
    }
    Ok(ConnectionMode::Plaintext)
}
