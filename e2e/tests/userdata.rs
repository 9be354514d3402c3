// Golden snapshots of the user data rendered for every OS variant. After an intentional template
// change, run `cargo insta review` to accept the new output.

use e2e::os::{OsVariant, RhelCredentials};
use e2e::userdata::{NodeadmUrls, UserDataInput};
use std::str::FromStr;

const NODEADM_CONFIG: &str = "\
apiVersion: node.eks.aws/v1alpha1
kind: NodeConfig
spec:
  cluster:
    name: hybrid-cluster
    region: us-west-2
  hybrid:
    ssm:
      activationCode: activation-code
      activationId: activation-id
";

fn input() -> UserDataInput {
    UserDataInput {
        kubernetes_version: "1.31".to_string(),
        nodeadm_urls: NodeadmUrls {
            amd: "https://hybrid-assets.example.com/releases/latest/bin/linux/amd64/nodeadm"
                .to_string(),
            arm: "https://hybrid-assets.example.com/releases/latest/bin/linux/arm64/nodeadm"
                .to_string(),
        },
        nodeadm_config_yaml: NODEADM_CONFIG.to_string(),
        provider: "ssm".to_string(),
        files: Vec::new(),
    }
}

fn render(variant: OsVariant) -> String {
    let credentials = RhelCredentials::new("rhel-user", "rhel-pass");
    let os = variant.build(Some(&credentials)).unwrap();
    String::from_utf8(os.build_user_data(input()).unwrap()).unwrap()
}

#[test]
fn al23_amd64() {
    insta::assert_snapshot!(
        "al23-amd64",
        render(OsVariant::from_str("al23-amd64").unwrap())
    );
}

#[test]
fn al23_arm64() {
    insta::assert_snapshot!(
        "al23-arm64",
        render(OsVariant::from_str("al23-arm64").unwrap())
    );
}

#[test]
fn rhel8_amd64() {
    insta::assert_snapshot!(
        "rhel8-amd64",
        render(OsVariant::from_str("rhel8-amd64").unwrap())
    );
}

#[test]
fn rhel8_arm64() {
    insta::assert_snapshot!(
        "rhel8-arm64",
        render(OsVariant::from_str("rhel8-arm64").unwrap())
    );
}

#[test]
fn rhel9_amd64() {
    insta::assert_snapshot!(
        "rhel9-amd64",
        render(OsVariant::from_str("rhel9-amd64").unwrap())
    );
}

#[test]
fn rhel9_arm64() {
    insta::assert_snapshot!(
        "rhel9-arm64",
        render(OsVariant::from_str("rhel9-arm64").unwrap())
    );
}

#[test]
fn rendering_is_deterministic() {
    for variant in OsVariant::ALL {
        assert_eq!(render(variant), render(variant), "{}", variant);
    }
}
