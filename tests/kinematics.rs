use approx::assert_relative_eq;
use diffik_lib::spacetime::custom_configuration_vector;
use diffik_lib::{Configuration, RobotModel, RootJoint};
use std::path::PathBuf;
use std::sync::Arc;

fn urdf(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets").join(relative)
}

/// Compares frame placements with the forward kinematics of `k`.
fn check_against_k(path: PathBuf, frames: &[&str], joint_values: &[(&str, f64)]) {
    let model = Arc::new(RobotModel::from_urdf_file(&path, RootJoint::Fixed).unwrap());
    let q = custom_configuration_vector(&model, joint_values).unwrap();
    let configuration = Configuration::new(model, q).unwrap();

    let chain = k::Chain::<f64>::from_urdf_file(&path).unwrap();
    for (name, value) in joint_values {
        chain.find(name).unwrap().set_joint_position(*value).unwrap();
    }
    chain.update_transforms();

    for name in frames {
        let expected = chain.find(name).unwrap().world_transform().unwrap();
        let actual = configuration.get_transform_frame_to_world(name).unwrap();
        let (t_k, r_k) = (expected.translation.vector, expected.rotation);
        let (t, r) = (actual.translation.vector, actual.rotation);
        for i in 0..3 {
            assert_relative_eq!(t[i], t_k[i], epsilon = 1e-10);
        }
        // same rotation up to the quaternion sign
        let dot = r.w * r_k.w + r.i * r_k.i + r.j * r_k.j + r.k * r_k.k;
        assert_relative_eq!(dot.abs(), 1.0, epsilon = 1e-10);
    }
}

#[test]
fn two_link_arm_matches_k() {
    check_against_k(
        urdf("two_link_arm.urdf"),
        &["shoulder", "elbow", "tool_joint"],
        &[("shoulder", 0.7), ("elbow", -1.1)],
    );
}

#[test]
fn biped_matches_k() {
    check_against_k(
        urdf("upkie/urdf/upkie.urdf"),
        &["left_hip", "left_knee", "left_wheel", "right_knee", "right_wheel"],
        &[
            ("left_hip", 0.3),
            ("left_knee", -0.6),
            ("left_wheel", 1.0),
            ("right_hip", -0.2),
            ("right_knee", 0.5),
            ("right_wheel", 2.0),
        ],
    );
}

#[test]
fn frames_follow_joint_names_and_links() {
    let model = RobotModel::from_urdf_file(urdf("upkie/urdf/upkie.urdf"), RootJoint::FreeFlyer).unwrap();
    for name in ["base", "left_knee", "left_knee_link", "right_wheel_tire"] {
        assert!(model.frame(name).is_ok(), "missing frame {name}");
    }
    let names: Vec<&str> = model.joints().iter().map(|j| j.name.as_str()).collect();
    assert_eq!(
        names,
        ["root_joint", "left_hip", "left_knee", "left_wheel", "right_hip", "right_knee", "right_wheel"]
    );
}
