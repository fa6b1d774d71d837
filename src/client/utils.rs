use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;

use crate::client::config::ConnectionConfig;
use crate::client::consts::ORIGIN_HEADER;

pub fn build_request(config: &ConnectionConfig) -> tokio_tungstenite::tungstenite::Result<Request> {
    let mut request = config.url().into_client_request()?;
    request.headers_mut().insert(ORIGIN_HEADER, config.origin().parse()?);
    Ok(request)
}
