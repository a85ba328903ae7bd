//! Device and directive listings.

use std::sync::Arc;

use serde::Serialize;
use tabled::Tabled;

use peerscope_core::{Device, Directive, Gateway};

use crate::cli::{DevicesArgs, DevicesCommand, DirectivesArgs, DirectivesCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

// ── Devices ─────────────────────────────────────────────────────────

#[derive(Serialize)]
struct DeviceView {
    name: String,
    display_name: String,
    platform: String,
    transport: String,
    address: String,
    port: u16,
    proxy: Option<String>,
    structured: bool,
    vrfs: Vec<String>,
    directives: Vec<String>,
}

impl DeviceView {
    fn new(device: &Device, directives: &[Arc<Directive>]) -> Self {
        Self {
            name: device.name.clone(),
            display_name: device.display_name.clone(),
            platform: device.platform.to_string(),
            transport: device.transport.kind().to_string(),
            address: device.address.clone(),
            port: device.port,
            proxy: device.transport.proxy().map(|p| p.name.clone()),
            structured: device.structured_capable(),
            vrfs: device.vrfs.iter().map(|v| v.name.clone()).collect(),
            directives: directives.iter().map(|d| d.id.clone()).collect(),
        }
    }
}

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Display Name")]
    display_name: String,
    #[tabled(rename = "Platform")]
    platform: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Via")]
    via: String,
    #[tabled(rename = "Structured")]
    structured: String,
    #[tabled(rename = "VRFs")]
    vrfs: String,
}

impl From<&DeviceView> for DeviceRow {
    fn from(d: &DeviceView) -> Self {
        Self {
            name: d.name.clone(),
            display_name: d.display_name.clone(),
            platform: d.platform.clone(),
            address: format!("{}:{}", d.address, d.port),
            via: d
                .proxy
                .as_ref()
                .map_or_else(|| d.transport.clone(), |p| format!("{} via {p}", d.transport)),
            structured: if d.structured { "yes" } else { "no" }.into(),
            vrfs: d.vrfs.join(", "),
        }
    }
}

fn device_detail(d: &DeviceView) -> String {
    let mut lines = vec![
        format!("Name:        {}", d.name),
        format!("Display:     {}", d.display_name),
        format!("Platform:    {}", d.platform),
        format!("Address:     {}:{}", d.address, d.port),
        format!("Transport:   {}", d.transport),
        format!("Proxy:       {}", d.proxy.as_deref().unwrap_or("-")),
        format!("Structured:  {}", if d.structured { "yes" } else { "no" }),
        format!("VRFs:        {}", d.vrfs.join(", ")),
        "Directives:".to_owned(),
    ];
    lines.extend(d.directives.iter().map(|id| format!("  {id}")));
    lines.join("\n")
}

pub fn devices(gateway: &Gateway, args: DevicesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let out = match args.command {
        DevicesCommand::List => {
            let views: Vec<DeviceView> = gateway
                .devices()
                .map(|d| DeviceView::new(d, &gateway.directives().for_device(d)))
                .collect();
            output::render_list(
                &global.output,
                &views,
                |d| DeviceRow::from(d),
                |d| d.name.clone(),
            )?
        }
        DevicesCommand::Get { name } => {
            let device = gateway
                .config()
                .device(&name)
                .ok_or_else(|| CliError::NotFound {
                    resource_type: "device".into(),
                    identifier: name.clone(),
                    list_command: "devices list".into(),
                })?;
            let view = DeviceView::new(device, &gateway.directives().for_device(device));
            output::render_single(&global.output, &view, device_detail, |d| d.name.clone())?
        }
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Directives ──────────────────────────────────────────────────────

#[derive(Serialize)]
struct DirectiveView {
    id: String,
    name: String,
    query_type: Option<String>,
    field: &'static str,
    platforms: Vec<String>,
    structured_variant: Option<String>,
    builtin: bool,
    info: Option<String>,
}

impl From<&Arc<Directive>> for DirectiveView {
    fn from(d: &Arc<Directive>) -> Self {
        Self {
            id: d.id.clone(),
            name: d.name.clone(),
            query_type: d.query_type.map(|q| q.to_string()),
            field: d.field.kind(),
            platforms: d.platforms.iter().map(ToString::to_string).collect(),
            structured_variant: d.table_output.as_ref().map(|t| t.id.clone()),
            builtin: d.builtin,
            info: d.info.clone(),
        }
    }
}

#[derive(Tabled)]
struct DirectiveRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    query_type: String,
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Structured")]
    structured: String,
    #[tabled(rename = "Source")]
    source: String,
}

impl From<&DirectiveView> for DirectiveRow {
    fn from(d: &DirectiveView) -> Self {
        Self {
            id: d.id.clone(),
            name: d.name.clone(),
            query_type: d.query_type.clone().unwrap_or_else(|| "-".into()),
            field: d.field.into(),
            structured: d.structured_variant.clone().unwrap_or_default(),
            source: if d.builtin { "built-in" } else { "config" }.into(),
        }
    }
}

pub fn directives(
    gateway: &Gateway,
    args: DirectivesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let DirectivesCommand::List { device } = args.command;
    let list = match device {
        Some(name) => gateway.directives_for(&name).map_err(|_| CliError::NotFound {
            resource_type: "device".into(),
            identifier: name.clone(),
            list_command: "devices list".into(),
        })?,
        None => gateway.directives().iter().cloned().collect(),
    };
    let views: Vec<DirectiveView> = list.iter().map(DirectiveView::from).collect();
    let out = output::render_list(
        &global.output,
        &views,
        |d| DirectiveRow::from(d),
        |d| d.id.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
