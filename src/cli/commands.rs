use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::core::dto::{BlogDetail, NewUser, PostDetail, TrashKind};
use crate::core::query::ListQuery;
use crate::core::store::BlogInstance;
use crate::core::Engine;
use crate::repositories::{
    BlogRepository, ExtensionRepository, PostRepository, TrashRepository, UsersRepository,
};
use crate::security::Principal;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// 指定站点目录
    #[arg(short, long, default_value = ".", global = true)]
    pub path: PathBuf,

    /// 目标博客（ID 或名称），默认为主博客
    #[arg(short, long, global = true)]
    pub blog: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 初始化新的站点
    Init(InitArgs),

    /// 启动服务器
    Serve(ServeArgs),

    /// 博客管理
    #[command(subcommand)]
    Blog(BlogCommands),

    /// 文章管理
    #[command(subcommand)]
    Post(PostCommands),

    /// 用户管理
    #[command(subcommand)]
    User(UserCommands),

    /// 扩展管理
    #[command(subcommand)]
    Extension(ExtensionCommands),

    /// 回收站
    #[command(subcommand)]
    Trash(TrashCommands),
}

#[derive(Args)]
pub struct InitArgs {
    /// 站点标题
    #[arg(short, long, default_value = "My Blog")]
    pub title: String,

    /// 管理员用户名
    #[arg(long, default_value = "admin")]
    pub admin: String,

    /// 管理员密码
    #[arg(long)]
    pub password: String,

    /// 管理员邮箱
    #[arg(long, default_value = "admin@example.com")]
    pub email: String,
}

#[derive(Args)]
pub struct ServeArgs {
    /// 服务器端口，默认使用配置文件中的端口
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Subcommand)]
pub enum BlogCommands {
    /// 列出所有博客
    List,
    /// 新增博客
    Add {
        name: String,
        #[arg(long, default_value = "")]
        hostname: String,
        #[arg(long, default_value = "")]
        virtual_path: String,
        /// 聚合所有博客的文章
        #[arg(long)]
        aggregation: bool,
    },
    /// 删除博客
    Remove { id: Uuid },
}

#[derive(Subcommand)]
pub enum PostCommands {
    /// 列出文章
    List {
        /// 过滤表达式
        #[arg(long)]
        filter: Option<String>,
        #[arg(long, default_value_t = 0)]
        take: usize,
    },
    /// 新建文章
    New {
        title: String,
        /// 从文件读取正文
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// 标签，逗号分隔
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        #[arg(long, default_value = "")]
        author: String,
        #[arg(long)]
        publish: bool,
    },
    /// 发布文章
    Publish { id: Uuid },
    /// 撤回文章
    Unpublish { id: Uuid },
    /// 删除文章（移入回收站）
    Remove { id: Uuid },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// 列出用户
    List,
    /// 新增用户
    Add {
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// 角色，逗号分隔
        #[arg(long, value_delimiter = ',')]
        roles: Vec<String>,
    },
    /// 重置密码
    Password { name: String, password: String },
    /// 删除用户
    Remove { name: String },
}

#[derive(Subcommand)]
pub enum ExtensionCommands {
    /// 列出扩展
    List,
    /// 启用扩展
    Enable { name: String },
    /// 禁用扩展
    Disable { name: String },
}

#[derive(Subcommand)]
pub enum TrashCommands {
    /// 列出回收站
    List,
    /// 恢复条目
    Restore { kind: TrashKind, id: Uuid },
    /// 清空回收站
    Empty,
}

/// 按 ID 或名称选择博客
fn select_instance(engine: &Engine, blog: Option<&str>) -> Result<Arc<BlogInstance>> {
    let site = engine.site();
    let Some(key) = blog else {
        return site.primary_instance();
    };
    let found = site
        .blogs()
        .into_iter()
        .find(|b| Uuid::parse_str(key).map_or(false, |id| id == b.id) || b.name.eq_ignore_ascii_case(key))
        .ok_or_else(|| anyhow!("博客不存在: {}", key))?;
    site.instance(found.id)
}

/// 执行命令
pub async fn execute(cli: Cli) -> Result<()> {
    let site_path = cli.path.clone();
    let open = || Engine::new(site_path.clone());
    let system = Principal::System;

    match cli.command {
        Commands::Init(args) => {
            Engine::init(&site_path, &args.title, &args.admin, &args.password, &args.email)?;
            println!("{} {}", "站点已创建:".green(), site_path.display());
        }
        Commands::Serve(args) => {
            open()?.server(args.port).await?;
        }
        Commands::Blog(command) => {
            let engine = open()?;
            let instance = engine.site().primary_instance()?;
            let blogs = BlogRepository::new(engine.site(), &instance, &system);
            match command {
                BlogCommands::List => {
                    for blog in blogs.find(&ListQuery::all())? {
                        let marker = if blog.is_primary { "*" } else { " " };
                        let state = if blog.is_active { "active".green() } else { "inactive".red() };
                        println!(
                            "{} {} {} host={} path={} [{}]",
                            marker,
                            blog.id.to_string().bright_black(),
                            blog.name.bright_white(),
                            blog.hostname,
                            blog.virtual_path,
                            state
                        );
                    }
                }
                BlogCommands::Add {
                    name,
                    hostname,
                    virtual_path,
                    aggregation,
                } => {
                    let detail = BlogDetail {
                        hostname,
                        virtual_path,
                        is_site_aggregation: aggregation,
                        ..BlogDetail::new(&name)
                    };
                    let created = blogs.add(&detail)?;
                    info!("已创建博客 {} ({})", created.name, created.id);
                }
                BlogCommands::Remove { id } => {
                    blogs.remove(id)?;
                    info!("已删除博客 {}", id);
                }
            }
        }
        Commands::Post(command) => {
            let engine = open()?;
            let instance = select_instance(&engine, cli.blog.as_deref())?;
            let posts = PostRepository::new(&instance, &system);
            match command {
                PostCommands::List { filter, take } => {
                    let query = ListQuery {
                        take,
                        filter: filter.unwrap_or_default(),
                        ..ListQuery::all()
                    };
                    for post in posts.find(&query)? {
                        let state = if post.is_published { "published".green() } else { "draft".yellow() };
                        println!(
                            "{} {} {} [{}] {}",
                            post.id.to_string().bright_black(),
                            post.date_created.format("%Y-%m-%d"),
                            post.title.bright_white(),
                            state,
                            post.tags.join(", ")
                        );
                    }
                }
                PostCommands::New {
                    title,
                    file,
                    tags,
                    author,
                    publish,
                } => {
                    let content = match file {
                        Some(path) => fs::read_to_string(&path)
                            .with_context(|| format!("读取文件失败: {}", path.display()))?,
                        None => String::new(),
                    };
                    let detail = PostDetail {
                        tags,
                        author,
                        is_published: publish,
                        ..PostDetail::new(&title, &content)
                    };
                    let created = posts.add(&detail)?;
                    info!("已创建文章: {} ({})", created.title, created.slug);
                }
                PostCommands::Publish { id } => posts.set_published(id, true)?,
                PostCommands::Unpublish { id } => posts.set_published(id, false)?,
                PostCommands::Remove { id } => posts.remove(id)?,
            }
        }
        Commands::User(command) => {
            let engine = open()?;
            let instance = select_instance(&engine, cli.blog.as_deref())?;
            let users = UsersRepository::new(&instance, &system);
            match command {
                UserCommands::List => {
                    for user in users.find(&ListQuery::all())? {
                        println!(
                            "{} <{}> {}",
                            user.user_name.bright_white(),
                            user.email,
                            user.roles.join(", ").bright_black()
                        );
                    }
                }
                UserCommands::Add {
                    name,
                    email,
                    password,
                    roles,
                } => {
                    users.add(&NewUser {
                        user_name: name,
                        email,
                        password,
                        roles,
                    })?;
                }
                UserCommands::Password { name, password } => {
                    users.change_password(&name, None, &password)?;
                }
                UserCommands::Remove { name } => users.remove(&name)?,
            }
        }
        Commands::Extension(command) => {
            let engine = open()?;
            let instance = select_instance(&engine, cli.blog.as_deref())?;
            let extensions = ExtensionRepository::new(&instance, &system);
            match command {
                ExtensionCommands::List => {
                    for item in extensions.list()? {
                        let state = if item.enabled { "enabled".green() } else { "disabled".red() };
                        println!(
                            "{} {} [{}] priority={} {}",
                            item.name.bright_white(),
                            item.version,
                            state,
                            item.priority,
                            item.description.bright_black()
                        );
                    }
                }
                ExtensionCommands::Enable { name } => {
                    extensions.set_enabled(&name, true)?;
                }
                ExtensionCommands::Disable { name } => {
                    extensions.set_enabled(&name, false)?;
                }
            }
        }
        Commands::Trash(command) => {
            let engine = open()?;
            let instance = select_instance(&engine, cli.blog.as_deref())?;
            let trash = TrashRepository::new(&instance, &system);
            match command {
                TrashCommands::List => {
                    for item in trash.find(&ListQuery::all())? {
                        println!(
                            "{:?} {} {}",
                            item.kind,
                            item.id.to_string().bright_black(),
                            item.title.bright_white()
                        );
                    }
                }
                TrashCommands::Restore { kind, id } => trash.restore(kind, id)?,
                TrashCommands::Empty => {
                    let removed = trash.purge_all()?;
                    info!("已清空回收站: {} 项", removed);
                }
            }
        }
    }

    Ok(())
}
