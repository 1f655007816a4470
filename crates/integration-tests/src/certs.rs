use config::TlsServerConfig;
use tempfile::TempDir;
use wtransport::Identity;

/// A throwaway self-signed certificate for `localhost`, written as PEM files.
pub struct TestCertificates {
    _dir: TempDir,
    pub tls: TlsServerConfig,
}

impl TestCertificates {
    pub async fn generate() -> Self {
        let dir = TempDir::new().unwrap();

        let identity = Identity::self_signed(["localhost", "127.0.0.1", "::1"]).unwrap();

        let certificate = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");

        identity.certificate_chain().store_pemfile(&certificate).await.unwrap();
        identity.private_key().store_secret_pemfile(&key).await.unwrap();

        Self {
            _dir: dir,
            tls: TlsServerConfig { certificate, key },
        }
    }
}
