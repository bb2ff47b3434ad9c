fn main() -> anyhow::Result<()> {
    action_recorder_lib::run()
}
