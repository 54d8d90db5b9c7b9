//! Pool construction from a connection string.
//!
//! `sslmode`, `sslrootcert`, `sslcert` and `sslkey` are read from the query
//! string, falling back to `PGSSLMODE`, `PGSSLROOTCERT`, `PGSSLCERT` and
//! `PGSSLKEY`. `sslmode=disable` (the default) opens plain sockets, any other
//! mode goes through OpenSSL. Remaining parameters are handed to
//! tokio-postgres unchanged.

use crate::{DatabaseOptions, options::redact};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use keel_core::{Error, Result};
use openssl::ssl::{SslConnector, SslFiletype, SslMethod, SslVerifyMode};
use postgres_openssl::MakeTlsConnector;
use std::{env, path::Path, time::Duration};
use tokio_postgres::{NoTls, config::SslMode};
use url::Url;

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct TlsParams {
    pub(crate) mode: String,
    pub(crate) root_cert: Option<String>,
    pub(crate) cert: Option<String>,
    pub(crate) key: Option<String>,
}

fn connection_error(context: String, source: impl Into<keel_core::BoxError>) -> Error {
    let e = Error::connection(context, Some(source.into()));
    log::error!("{}", e.report());
    e
}

/// Splits the TLS parameters off the connection string.
pub(crate) fn parse_url(url: &str) -> Result<(Url, TlsParams)> {
    let context = || format!("While parsing the connection string `{}`", redact(url));
    let mut url = Url::parse(url).map_err(|e| connection_error(context(), e))?;
    if !matches!(url.scheme(), "postgres" | "postgresql") {
        let e = Error::connection(
            format!(
                "{}: the scheme must be `postgres://` or `postgresql://`",
                context()
            ),
            None,
        );
        log::error!("{}", e.report());
        return Err(e);
    }
    let mut take_url_param = |key: &str, env_var: &str| {
        let mut value = None;
        let mut pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        if let Some(pos) = pairs.iter().position(|(k, _)| k == key) {
            let (_, v) = pairs.remove(pos);
            value = Some(v);
        }
        if pairs.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut()
                .clear()
                .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        value.or_else(|| env::var(env_var).ok())
    };
    let tls = TlsParams {
        mode: take_url_param("sslmode", "PGSSLMODE").unwrap_or_else(|| "disable".into()),
        root_cert: take_url_param("sslrootcert", "PGSSLROOTCERT"),
        cert: take_url_param("sslcert", "PGSSLCERT"),
        key: take_url_param("sslkey", "PGSSLKEY"),
    };
    Ok((url, tls))
}

fn make_tls(params: &TlsParams) -> Result<MakeTlsConnector> {
    let context = || format!("While configuring TLS with sslmode={}", params.mode);
    let mut builder =
        SslConnector::builder(SslMethod::tls()).map_err(|e| connection_error(context(), e))?;
    if let Some(path) = params.root_cert.as_deref().map(Path::new)
        && path.exists()
    {
        builder
            .set_ca_file(path)
            .map_err(|e| connection_error(context(), e))?;
    }
    if let Some(path) = params.cert.as_deref().map(Path::new)
        && path.exists()
    {
        builder
            .set_certificate_chain_file(path)
            .map_err(|e| connection_error(context(), e))?;
    }
    if let Some(path) = params.key.as_deref().map(Path::new)
        && path.exists()
    {
        builder
            .set_private_key_file(path, SslFiletype::PEM)
            .map_err(|e| connection_error(context(), e))?;
    }
    match params.mode.as_str() {
        "allow" | "prefer" | "require" => builder.set_verify(SslVerifyMode::NONE),
        _ => builder.set_verify(SslVerifyMode::PEER),
    }
    let mut connector = MakeTlsConnector::new(builder.build());
    if params.mode != "verify-full" {
        connector.set_callback(|config, _| {
            config.set_verify_hostname(false);
            Ok(())
        });
    }
    Ok(connector)
}

/// A pool for `options.url`. No connection is opened yet.
pub(crate) fn build_pool(options: &DatabaseOptions) -> Result<Pool> {
    let (url, tls) = parse_url(&options.url)?;
    let context = || format!("While creating the pool for `{}`", redact(&options.url));
    let mut config = url
        .as_str()
        .parse::<tokio_postgres::Config>()
        .map_err(|e| connection_error(context(), e))?;
    config.connect_timeout(options.connect_timeout);
    let manager_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };
    let manager = if tls.mode == "disable" {
        Manager::from_config(config, NoTls, manager_config)
    } else {
        if !matches!(tls.mode.as_str(), "allow" | "prefer") {
            config.ssl_mode(SslMode::Require);
        }
        Manager::from_config(config, make_tls(&tls)?, manager_config)
    };
    Pool::builder(manager)
        .max_size(options.max_connections)
        .runtime(Runtime::Tokio1)
        .wait_timeout(Some(options.connect_timeout))
        .create_timeout(Some(options.connect_timeout))
        .build()
        .map_err(|e| connection_error(context(), e))
}

/// Round trip through a pooled connection, bounded by `timeout`.
pub(crate) async fn ping(pool: &Pool, timeout: Duration) -> Result<()> {
    let attempt = async {
        let client = pool
            .get()
            .await
            .map_err(|e| Error::connection("Could not get a connection from the pool", Some(e.into())))?;
        client
            .simple_query("SELECT 1")
            .await
            .map(|_| ())
            .map_err(|e| Error::connection("The server did not answer the ping", Some(e.into())))
    };
    match tokio::time::timeout(timeout, attempt).await {
        Ok(result) => result,
        Err(elapsed) => Err(Error::connection(
            format!("The ping did not complete within {:?}", timeout),
            Some(elapsed.into()),
        )),
    }
}

/// Builds a pool and checks it answers within the connect timeout.
pub(crate) async fn connect_pool(options: &DatabaseOptions) -> Result<Pool> {
    let pool = build_pool(options)?;
    if let Err(e) = ping(&pool, options.connect_timeout).await {
        pool.close();
        let e = e.context(format!(
            "While connecting to `{}`",
            redact(&options.url)
        ));
        log::error!("{}", e.report());
        return Err(e);
    }
    log::info!(
        "Connected to `{}` with up to {} connections",
        redact(&options.url),
        options.max_connections
    );
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tls_params_are_taken_from_the_url() {
        let (url, tls) = parse_url(
            "postgres://keel:pw@db.local:5433/books?sslmode=verify-ca&application_name=keel&sslrootcert=/etc/ca.pem",
        )
        .unwrap();
        assert_eq!(tls.mode, "verify-ca");
        assert_eq!(tls.root_cert.as_deref(), Some("/etc/ca.pem"));
        assert_eq!(url.query(), Some("application_name=keel"));
    }

    #[test]
    fn query_string_is_dropped_when_empty() {
        let (url, _) = parse_url("postgresql://keel@localhost/books?sslmode=disable").unwrap();
        assert_eq!(url.as_str(), "postgresql://keel@localhost/books");
    }

    #[test]
    fn wrong_scheme() {
        let error = parse_url("mysql://keel@localhost/books").unwrap_err();
        assert_eq!(error.kind(), keel_core::ErrorKind::Connection);
    }
}
