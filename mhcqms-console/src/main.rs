//! MHCQMS控制台主程序

mod config;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand};
use mhcqms_client::{Credentials, FileTokenStore};
use mhcqms_core::{
    Gender, Patient, PatientRegistration, PatientUpdate, Priority, QueueCreate, QueueEntry,
    QueueError, QueueFilter, QueueStatus, RecordId,
};
use mhcqms_report::{write_report, ReportFilter, ReportPeriod, ReportSummary};
use mhcqms_store::ConsoleContext;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::ConsoleConfig;

/// MHCQMS控制台命令行参数
#[derive(Parser, Debug)]
#[command(name = "mhcqms-console")]
#[command(about = "MHCQMS 医疗检查排队管理控制台")]
struct Args {
    /// 配置文件路径
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// 接口根地址，覆盖配置文件
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 登录并保存凭证
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long, env = "MHCQMS_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// 注销
    Logout,
    /// 显示当前用户
    Whoami,
    /// 患者管理
    #[command(subcommand)]
    Patients(PatientCommand),
    /// 排队管理
    #[command(subcommand)]
    Queue(QueueCommand),
    /// 报表
    #[command(subcommand)]
    Report(ReportCommand),
}

#[derive(Subcommand, Debug)]
enum PatientCommand {
    /// 待诊患者
    List,
    /// 已完成患者
    Completed,
    /// 登记患者并加入排队
    Register(RegisterArgs),
    /// 修改患者信息
    Update(UpdateArgs),
    /// 删除患者
    Delete { id: RecordId },
    /// 标记为已就诊
    Serve { id: RecordId },
    /// 统计
    Stats,
}

#[derive(ClapArgs, Debug)]
struct RegisterArgs {
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    /// 出生日期 (YYYY-MM-DD)
    #[arg(long)]
    date_of_birth: NaiveDate,
    /// male / female / other
    #[arg(long)]
    gender: Gender,
    #[arg(long)]
    phone: String,
    #[arg(long)]
    checkup_type: String,
    /// normal / urgent / emergency 或 0 / 1 / 2
    #[arg(long)]
    priority: Option<Priority>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    emergency_contact: Option<String>,
    #[arg(long)]
    symptoms: Option<String>,
    /// 预估等待分钟数
    #[arg(long)]
    wait: Option<u32>,
}

#[derive(ClapArgs, Debug)]
struct UpdateArgs {
    id: RecordId,
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    /// 出生日期 (YYYY-MM-DD)
    #[arg(long)]
    date_of_birth: Option<NaiveDate>,
    /// male / female / other
    #[arg(long)]
    gender: Option<Gender>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    emergency_contact: Option<String>,
    #[arg(long)]
    symptoms: Option<String>,
}

#[derive(Subcommand, Debug)]
enum QueueCommand {
    /// 排队列表
    List {
        #[arg(long)]
        status: Option<QueueStatus>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long, default_value_t = 0)]
        skip: u32,
        #[arg(long, default_value_t = 100)]
        limit: u32,
    },
    /// 加入排队
    Add {
        patient_id: RecordId,
        #[arg(long)]
        checkup_type: String,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        wait: Option<u32>,
    },
    /// 修改状态
    Status {
        id: RecordId,
        status: QueueStatus,
        #[arg(long)]
        notes: Option<String>,
    },
    /// 推进到下一状态
    Advance { id: RecordId },
    /// 移出排队
    Remove { id: RecordId },
    /// 服务端统计
    Summary,
    /// 下一位候诊患者
    Next,
}

#[derive(Subcommand, Debug)]
enum ReportCommand {
    /// 导出已完成记录为CSV
    Export {
        /// today / week / month / all
        #[arg(long, default_value = "today")]
        period: ReportPeriod,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
        /// 输出目录，覆盖配置文件
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ConsoleConfig::load(args.config.as_deref())?;
    if let Some(base_url) = &args.base_url {
        config.api.base_url = base_url.clone();
        config.validate()?;
    }

    // 初始化日志
    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    tracing_subscriber::fmt().with_env_filter(level).init();

    info!("MHCQMS 控制台启动，接口地址: {}", config.api.base_url);

    let tokens = Arc::new(FileTokenStore::new(&config.session.token_path));
    let context = ConsoleContext::new(config.api.clone(), tokens)
        .await
        .context("Failed to initialize console context")?;

    if let Err(e) = run(&context, &config, args.command).await {
        if matches!(e.downcast_ref::<QueueError>(), Some(err) if err.is_auth()) {
            error!("会话已失效，请重新登录");
        }
        return Err(e);
    }
    Ok(())
}

async fn run(context: &ConsoleContext, config: &ConsoleConfig, command: Command) -> Result<()> {
    match command {
        Command::Login { username, password } => {
            let user = context.login(&Credentials::new(username, password)).await?;
            println!("Logged in as {}", user.display_name());
        }
        Command::Logout => {
            context.logout().await?;
            println!("Logged out");
        }
        Command::Whoami => {
            let user = context.current_user().await?;
            println!(
                "{} ({}){}",
                user.display_name(),
                user.username,
                if user.is_superuser { " [admin]" } else { "" }
            );
        }
        Command::Patients(command) => run_patients(context, command).await?,
        Command::Queue(command) => run_queue(context, command).await?,
        Command::Report(command) => run_report(context, config, command).await?,
    }
    Ok(())
}

async fn run_patients(context: &ConsoleContext, command: PatientCommand) -> Result<()> {
    let store = context.patients();
    match command {
        PatientCommand::List => {
            let patients = store.fetch_patients().await?;
            print_patients(&patients);
        }
        PatientCommand::Completed => {
            let patients = store.fetch_completed_patients().await?;
            print_completed(&patients);
        }
        PatientCommand::Register(args) => {
            let data = PatientRegistration {
                first_name: args.first_name,
                last_name: args.last_name,
                date_of_birth: Some(args.date_of_birth),
                gender: Some(args.gender),
                phone: args.phone,
                email: args.email,
                address: args.address,
                emergency_contact: args.emergency_contact,
                checkup_type: args.checkup_type,
                priority: args.priority,
                symptoms: args.symptoms,
                estimated_wait_time: args.wait,
            };
            let registration = store.register_patient(data).await?;
            println!(
                "Registered {} as patient {}",
                registration.patient.full_name(),
                registration.patient.id
            );
            if let Some(entry) = registration.queue_entry {
                println!(
                    "Queue number {} ({})",
                    entry.queue_number.as_deref().unwrap_or("-"),
                    entry.status
                );
            }
        }
        PatientCommand::Update(args) => {
            // 缓存中需要有该记录才能替换
            store.fetch_patients().await?;
            let update = PatientUpdate {
                first_name: args.first_name,
                last_name: args.last_name,
                date_of_birth: args.date_of_birth,
                gender: args.gender,
                phone: args.phone,
                email: args.email,
                address: args.address,
                emergency_contact: args.emergency_contact,
                medical_history: args.symptoms,
            };
            if update.is_empty() {
                anyhow::bail!("nothing to update");
            }
            let patient = store.update_patient(&args.id, update).await?;
            println!("Updated patient {}", patient.id);
        }
        PatientCommand::Delete { id } => {
            store.delete_patient(&id).await?;
            println!("Deleted patient {}", id);
        }
        PatientCommand::Serve { id } => {
            let patient = store.mark_served(&id).await?;
            println!(
                "{} served, waited {} minutes",
                patient.full_name(),
                patient.wait_minutes()
            );
        }
        PatientCommand::Stats => {
            store.fetch_patients().await?;
            store.fetch_completed_patients().await?;
            let stats = store.compute_stats().await;
            println!("In queue:          {}", stats.total_in_queue);
            println!("Served:            {}", stats.total_served);
            println!("Average wait (min): {}", stats.average_wait_time);
            for (priority, count) in store.priority_breakdown().await {
                println!("  {:<10} {}", priority.label(), count);
            }
        }
    }
    Ok(())
}

async fn run_queue(context: &ConsoleContext, command: QueueCommand) -> Result<()> {
    let store = context.queue();
    match command {
        QueueCommand::List {
            status,
            priority,
            skip,
            limit,
        } => {
            let filter = QueueFilter {
                status,
                priority,
                skip,
                limit,
            };
            let entries = store.fetch_queue(&filter).await?;
            print_entries(&entries);
        }
        QueueCommand::Add {
            patient_id,
            checkup_type,
            priority,
            notes,
            wait,
        } => {
            // 重复检查需要完整的进行中条目
            store.fetch_active().await?;
            let entry = store
                .add_to_queue(QueueCreate {
                    patient_id,
                    checkup_type,
                    priority: priority.unwrap_or_default(),
                    notes,
                    estimated_wait_time: wait,
                })
                .await?;
            println!("Added queue entry {}", entry.id);
        }
        QueueCommand::Status { id, status, notes } => {
            store.fetch_active().await?;
            let entry = store.update_status(&id, status, notes).await?;
            println!("Queue entry {} is now {}", entry.id, entry.status);
        }
        QueueCommand::Advance { id } => {
            store.fetch_active().await?;
            let entry = store.advance(&id).await?;
            println!("Queue entry {} is now {}", entry.id, entry.status);
        }
        QueueCommand::Remove { id } => {
            store.remove_from_queue(&id).await?;
            println!("Removed queue entry {}", id);
        }
        QueueCommand::Summary => {
            let summary = store.fetch_summary().await?;
            println!("Waiting:      {}", summary.total_waiting);
            println!("In progress:  {}", summary.total_in_progress);
            println!("Completed:    {}", summary.total_completed);
            println!("Cancelled:    {}", summary.total_cancelled);
            println!("Average wait: {} min", summary.average_wait_time);
            if let Some(eta) = summary.estimated_completion_time {
                println!("Estimated completion: {}", eta);
            }
        }
        QueueCommand::Next => {
            let filter = QueueFilter {
                status: Some(QueueStatus::Waiting),
                ..Default::default()
            };
            store.fetch_queue(&filter).await?;
            match store.next_waiting().await {
                Some(entry) => print_entries(std::slice::from_ref(&entry)),
                None => println!("No patients waiting"),
            }
        }
    }
    Ok(())
}

async fn run_report(
    context: &ConsoleContext,
    config: &ConsoleConfig,
    command: ReportCommand,
) -> Result<()> {
    match command {
        ReportCommand::Export {
            period,
            search,
            priority,
            output_dir,
        } => {
            let completed = context.patients().fetch_completed_patients().await?;
            let filter = ReportFilter {
                search,
                period,
                priority,
            };
            let now = Utc::now();
            let records = filter.apply(&completed, now);
            let summary = ReportSummary::from_records(records.iter().copied());

            let dir = output_dir.unwrap_or_else(|| config.report.output_dir.clone());
            let path = write_report(&dir, period, now, &records)
                .await
                .with_context(|| format!("Failed to write report to {}", dir.display()))?;

            println!(
                "{} records, average wait {} min -> {}",
                summary.total,
                summary.average_wait_time,
                path.display()
            );
            for (band, count) in &summary.wait_bands {
                println!("  {:<10} {}", band.as_str(), count);
            }
        }
    }
    Ok(())
}

fn print_patients(patients: &[Patient]) {
    if patients.is_empty() {
        println!("No patients");
        return;
    }
    for p in patients {
        println!(
            "{:>6}  {:<24} {:<10} {:<16} {}",
            p.id.to_string(),
            p.full_name(),
            p.priority.to_string(),
            p.contact(),
            p.checkup_type.as_deref().unwrap_or("-")
        );
    }
}

fn print_completed(patients: &[Patient]) {
    if patients.is_empty() {
        println!("No patients");
        return;
    }
    for p in patients {
        let waited = match (p.elapsed_wait_minutes(), p.wait_band()) {
            (Some(minutes), Some(band)) => format!("{} min ({})", minutes, band),
            _ => "-".to_string(),
        };
        println!(
            "{:>6}  {:<24} {:<10} {:<16} {}",
            p.id.to_string(),
            p.full_name(),
            p.priority.to_string(),
            waited,
            p.served_at
                .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }
}

fn print_entries(entries: &[QueueEntry]) {
    if entries.is_empty() {
        println!("No queue entries");
        return;
    }
    for e in entries {
        println!(
            "{:>6}  {:<8} patient {:<6} {:<10} {:<12} {}",
            e.id.to_string(),
            e.queue_number.as_deref().unwrap_or("-"),
            e.patient_id.to_string(),
            e.priority.to_string(),
            e.status.to_string(),
            e.checkup_type
        );
    }
}
