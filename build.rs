use std::process::Command;

fn git_cmd(args: &[&str]) -> Option<String> {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
}

fn main() {
    let git_desc = git_cmd(&["describe", "--tags", "--always"]).unwrap_or_default();
    let is_dirty = git_cmd(&["status", "--porcelain"]).map(|o| !o.is_empty()) == Some(true);
    println!("cargo:rustc-env=GIT_DESC={git_desc}");
    println!("cargo:rustc-env=GIT_DIRTY={is_dirty}");
    println!("cargo:rerun-if-changed=.git/HEAD");
}
