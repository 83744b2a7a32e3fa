use kube::CustomResourceExt as _;
use mariadb::api::v1beta1::mariadb::MariaDB;

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", serde_yaml::to_string(&MariaDB::crd())?);
    Ok(())
}
