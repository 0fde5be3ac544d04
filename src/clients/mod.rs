pub mod kube_client;

pub use kube_client::KubeJobRunner;
