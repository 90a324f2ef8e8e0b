use log::{error, warn};
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode};
use postgres_openssl::MakeTlsConnector;
use tokio::time::Duration;
use url::Url;

/// How often and how patiently a database write is retried
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub wait_between_attempts: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 100,
            wait_between_attempts: Duration::from_secs(5),
        }
    }
}

pub fn create_ssl_connector(sslrootcert_path: &str) -> Result<MakeTlsConnector, String> {
    let mut builder =
        SslConnector::builder(SslMethod::tls()).map_err(|e| format!("SSL builder error: {}", e))?;

    builder
        .set_ca_file(sslrootcert_path)
        .map_err(|e| format!("Error loading CA cert: {}", e))?;
    builder.set_verify(SslVerifyMode::PEER);

    Ok(MakeTlsConnector::new(builder.build()))
}

/// Strip the `sslrootcert` parameter from a connection URL
///
/// tokio-postgres rejects the parameter, so it is removed here and the CA
/// path is handed to the TLS connector instead.
///
/// # Returns
/// The URL without `sslrootcert` and the CA certificate path
pub fn split_database_url(database_url: &str) -> Result<(String, String), String> {
    let mut url = Url::parse(database_url).map_err(|e| format!("URL parse error: {}", e))?;

    let mut sslrootcert_path = None;
    let mut params = Vec::new();
    for (key, value) in url.query_pairs() {
        if key == "sslrootcert" {
            sslrootcert_path = Some(value.into_owned());
        } else {
            params.push(format!("{}={}", key, value));
        }
    }

    let sslrootcert_path = sslrootcert_path.ok_or("sslrootcert parameter missing")?;

    if params.is_empty() {
        url.set_query(None);
    } else {
        url.set_query(Some(&params.join("&")));
    }

    Ok((url.to_string(), sslrootcert_path))
}

/// Run a single-statement operation, reconnecting and retrying on failure
///
/// A malformed URL, missing CA path or unusable CA file fails immediately.
/// Connection and query errors are logged and retried according to `policy`.
pub async fn execute_with_retry<F, Fut>(
    database_url: &str,
    policy: RetryPolicy,
    operation: F,
) -> Result<(), String>
where
    F: Fn(tokio_postgres::Client) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<u64, tokio_postgres::Error>> + Send,
{
    let (clean_database_url, sslrootcert_path) = split_database_url(database_url)?;

    for attempt in 1..=policy.max_attempts {
        // A missing or unreadable CA file will not fix itself between attempts
        let connector = create_ssl_connector(&sslrootcert_path)?;

        match tokio_postgres::connect(&clean_database_url, connector).await {
            Ok((client, connection)) => {
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        error!("Connection error: {}", e);
                    }
                });

                match operation(client).await {
                    Ok(_) => return Ok(()),
                    Err(e) => error!("Attempt {}: query error: {}", attempt, e),
                }
            }
            Err(e) => error!("Attempt {}: connection error: {}", attempt, e),
        }

        if attempt < policy.max_attempts {
            warn!(
                "Retrying in {} seconds",
                policy.wait_between_attempts.as_secs()
            );
            tokio::time::sleep(policy.wait_between_attempts).await;
        }
    }

    Err("Max retries exceeded".into())
}
