//! `ldap3`-backed [`Directory`] implementation.

use std::time::Duration;

use async_trait::async_trait;
use ldap3::adapters::{Adapter, EntriesOnly, PagedResults};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use tracing::{debug, info, warn};

use super::{Directory, DirectoryEntry, DirectoryError, QueryScope};
use crate::config::DirectoryConfig;

/// Page size requested from the server; AD caps unpaged searches at 1000.
const PAGE_SIZE: i32 = 500;

/// LDAP result code for invalid credentials.
const RC_INVALID_CREDENTIALS: u32 = 49;

/// Attributes that must always be read as raw bytes.
const BINARY_ATTRIBUTES: [&str; 2] = ["objectguid", "objectsid"];

/// A bound LDAP session.
///
/// The underlying [`Ldap`] handle is cheap to clone; each query works on its
/// own clone so concurrent tasks can share one `LdapDirectory`.
pub struct LdapDirectory {
    ldap: Ldap,
    base_dn: String,
}

impl std::fmt::Debug for LdapDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapDirectory")
            .field("base_dn", &self.base_dn)
            .finish()
    }
}

impl LdapDirectory {
    /// Connect and bind using `config`.
    ///
    /// An empty or absent `bind_dn` performs no bind (anonymous session).
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Connection`] when the server is unreachable
    /// and [`DirectoryError::Bind`] when the credentials are rejected.
    pub async fn connect(
        config: &DirectoryConfig,
        password: Option<&str>,
    ) -> Result<Self, DirectoryError> {
        if config.host.is_empty() {
            return Err(DirectoryError::InvalidConfiguration(
                "directory host is empty".to_owned(),
            ));
        }

        let url = config.url();
        debug!(url = %url, "connecting to directory");

        let settings = LdapConnSettings::new()
            .set_conn_timeout(Duration::from_secs(config.connect_timeout_secs))
            .set_starttls(config.use_starttls && !config.use_ssl);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|e| DirectoryError::Connection(format!("{url}: {e}")))?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection driver error");
            }
        });

        if let Some(bind_dn) = config.bind_dn.as_deref().filter(|dn| !dn.is_empty()) {
            debug!(bind_dn = %bind_dn, "performing simple bind");
            let result = ldap
                .simple_bind(bind_dn, password.unwrap_or_default())
                .await
                .map_err(|e| DirectoryError::Connection(e.to_string()))?;
            if result.rc != 0 {
                if result.rc == RC_INVALID_CREDENTIALS {
                    warn!(bind_dn = %bind_dn, "directory rejected credentials");
                }
                return Err(DirectoryError::Bind {
                    code: result.rc,
                    message: result.text,
                });
            }
        }

        info!(host = %config.host, base_dn = %config.base_dn, "directory session established");

        Ok(Self {
            ldap,
            base_dn: config.base_dn.clone(),
        })
    }

    /// Close the session.
    pub async fn unbind(mut self) {
        if let Err(e) = self.ldap.unbind().await {
            debug!(error = %e, "unbind failed");
        }
    }

    fn scope(scope: QueryScope) -> Scope {
        match scope {
            QueryScope::Base => Scope::Base,
            QueryScope::OneLevel => Scope::OneLevel,
            QueryScope::Subtree => Scope::Subtree,
        }
    }

    /// Convert an `ldap3` entry, moving GUID/SID text values into the binary map.
    fn to_entry(raw: SearchEntry) -> DirectoryEntry {
        let mut entry = DirectoryEntry::new(raw.dn);
        for (name, values) in raw.attrs {
            if BINARY_ATTRIBUTES.contains(&name.to_ascii_lowercase().as_str()) {
                entry.set_bin_attr(&name, values.into_iter().map(String::into_bytes).collect());
            } else {
                entry.set_attr(&name, values);
            }
        }
        for (name, values) in raw.bin_attrs {
            entry.set_bin_attr(&name, values);
        }
        entry
    }
}

#[async_trait]
impl Directory for LdapDirectory {
    async fn query(
        &self,
        filter: &str,
        attributes: &[&str],
        scope: QueryScope,
        base_dn: Option<&str>,
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let base = base_dn.unwrap_or(&self.base_dn);
        let attrs: Vec<String> = attributes.iter().map(|a| (*a).to_owned()).collect();

        debug!(filter = %filter, base_dn = %base, ?scope, "searching directory");

        let mut ldap = self.ldap.clone();
        let adapters: Vec<Box<dyn Adapter<_, _>>> = vec![
            Box::new(EntriesOnly::new()),
            Box::new(PagedResults::new(PAGE_SIZE)),
        ];
        let mut search = ldap
            .streaming_search_with(adapters, base, Self::scope(scope), filter, attrs)
            .await
            .map_err(|e| DirectoryError::Search {
                message: e.to_string(),
            })?;

        let mut entries = Vec::new();
        while let Some(raw) = search.next().await.map_err(|e| DirectoryError::Search {
            message: e.to_string(),
        })? {
            entries.push(Self::to_entry(SearchEntry::construct(raw)));
        }

        search
            .finish()
            .await
            .success()
            .map_err(|e| DirectoryError::Search {
                message: e.to_string(),
            })?;

        debug!(count = entries.len(), base_dn = %base, "search complete");
        Ok(entries)
    }
}
