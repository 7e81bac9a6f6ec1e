use url::Url;

/// Runtime API version token, first path segment of every endpoint.
pub const API_VERSION: &str = "2018-06-01";

/// URL templates of the runtime API.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    /// `runtime_api` is the `host:port` pair from the environment.
    pub fn new(runtime_api: &str) -> Result<Self, url::ParseError> {
        let base = Url::parse(&format!("http://{runtime_api}/"))?;
        if base.cannot_be_a_base() || base.host_str().is_none() {
            return Err(url::ParseError::EmptyHost);
        }
        Ok(Self { base })
    }

    /// `GET /{version}/runtime/invocation/next`
    pub fn next_invocation(&self) -> Url {
        self.join(&["invocation", "next"])
    }

    /// `POST /{version}/runtime/invocation/{id}/response`
    pub fn response(&self, request_id: &str) -> Url {
        self.join(&["invocation", request_id, "response"])
    }

    /// `POST /{version}/runtime/invocation/{id}/error`
    pub fn invocation_error(&self, request_id: &str) -> Url {
        self.join(&["invocation", request_id, "error"])
    }

    /// `POST /{version}/runtime/init/error`
    pub fn init_error(&self) -> Url {
        self.join(&["init", "error"])
    }

    fn join(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // Checked in `new`: an http base always has path segments.
        if let Ok(mut path) = url.path_segments_mut() {
            path.clear().push(API_VERSION).push("runtime").extend(segments);
        }
        url
    }
}
