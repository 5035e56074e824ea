use monitor_server::{print_banner, setup_environment, Server, ServerState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. 设置环境 (dotenv, 工作目录, 日志)
    let config = setup_environment()?;

    // 打印横幅
    print_banner();

    tracing::info!("Inventory monitor starting...");

    // 2. 初始化服务器状态（含数据库恢复与后台任务注册）
    let (state, tasks) = ServerState::initialize(&config).await;

    // 3. 启动 HTTP 服务器
    let server = Server::with_state(config, state, tasks);

    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
