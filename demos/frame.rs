//! A deferred-shading style frame with a post-processing chain.
//!
//! Run with `FRAMEGRAPH_LOG=framegraph=debug cargo run --example frame --features logging`.

use framegraph::{Graph, Handle, Lifetime, Realize, ResourceKind};

#[derive(Debug, Clone, Copy)]
struct TextureDesc {
    width: u32,
    height: u32,
}

#[derive(Debug)]
struct Texture {
    id: u32,
    texels: Vec<u32>,
}

struct Tex2D;

impl ResourceKind for Tex2D {
    type Desc = TextureDesc;
    type Actual = Texture;
}

/// Stand-in for a GPU device: hands out texture ids and records commands.
#[derive(Default)]
struct Device {
    next_id: u32,
    live: usize,
    commands: Vec<String>,
}

impl Realize<Device> for Tex2D {
    fn realize(desc: &TextureDesc, device: &mut Device) -> anyhow::Result<Texture> {
        device.next_id += 1;
        device.live += 1;
        Ok(Texture {
            id: device.next_id,
            texels: vec![0; (desc.width * desc.height) as usize],
        })
    }

    fn derealize(_: Texture, device: &mut Device) {
        device.live -= 1;
    }
}

#[derive(Default)]
struct Lighting {
    gbuffer: Option<Handle<Tex2D>>,
    history: Option<Handle<Tex2D>>,
    output: Option<Handle<Tex2D>>,
}

#[derive(Default)]
struct Tonemap {
    hdr: Option<Handle<Tex2D>>,
    target: Option<Handle<Tex2D>>,
}

fn main() -> anyhow::Result<()> {
    framegraph::init_logging()?;

    let size = TextureDesc {
        width: 64,
        height: 36,
    };

    let mut graph = Graph::<Device>::new();

    let gbuffer = graph.add_task(
        "gbuffer",
        |data: &mut Option<Handle<Tex2D>>, builder| {
            *data = Some(builder.create::<Tex2D>("gbuffer", size));
        },
        |data, task| {
            let handle = data.ok_or_else(|| anyhow::anyhow!("gbuffer was not declared"))?;
            if let Some(texture) = task.get_mut(handle) {
                texture.texels.fill(1);
            }
            task.ctx.commands.push("draw geometry".into());
            Ok(())
        },
    );
    let gbuffer = graph
        .task_data(gbuffer)
        .ok_or_else(|| anyhow::anyhow!("missing gbuffer"))?;

    let lighting = graph.add_task(
        "lighting",
        |data: &mut Lighting, builder| {
            data.gbuffer = Some(builder.read(gbuffer));
            let desc = *builder.descriptor(gbuffer);
            let history =
                builder.create_with_lifetime::<Tex2D>("history", desc, Lifetime::Persistent);
            data.history = Some(builder.write(history));
            data.output = Some(builder.create::<Tex2D>("hdr", desc));
        },
        |data, task| {
            let lit = data
                .gbuffer
                .and_then(|gbuffer| task.get(gbuffer))
                .map(|texture| texture.texels.iter().sum::<u32>())
                .unwrap_or(0);
            if let Some(history) = data.history.and_then(|history| task.get_mut(history)) {
                history.texels.fill(lit);
            }
            task.ctx.commands.push(format!("shade {lit} texels"));
            Ok(())
        },
    );
    let hdr = graph
        .task_data(lighting)
        .output
        .ok_or_else(|| anyhow::anyhow!("missing hdr"))?;

    let tonemap = graph.add_task(
        "tonemap",
        |data: &mut Tonemap, builder| {
            data.hdr = Some(builder.read(hdr));
            data.target = Some(builder.create_with_lifetime::<Tex2D>(
                "backbuffer",
                size,
                Lifetime::External,
            ));
        },
        |data, task| {
            let exposure = data
                .hdr
                .and_then(|hdr| task.get(hdr))
                .map_or(0, |texture| texture.texels.len());
            let target = data
                .target
                .and_then(|target| task.get(target))
                .map(|texture| texture.id);
            task.ctx.commands.push(format!("tonemap {exposure} texels into {target:?}"));
            Ok(())
        },
    );
    let backbuffer = graph
        .task_data(tonemap)
        .target
        .ok_or_else(|| anyhow::anyhow!("missing backbuffer"))?;

    graph.add_task(
        "present",
        |_: &mut (), builder| {
            builder.read(backbuffer);
        },
        |_, task| {
            task.ctx.commands.push("present".into());
            Ok(())
        },
    );

    graph.compile()?;
    println!("{graph}");

    if let Some(report) = graph.report() {
        println!("{}", report.to_json()?);
    }

    let mut device = Device::default();

    for frame in 0..3u32 {
        graph.set_external(
            backbuffer,
            Texture {
                id: 1000 + frame,
                texels: Vec::new(),
            },
        )?;

        let diagnostics = graph.execute(&mut device)?;

        println!(
            "frame {frame}: {} allocated, {} released, {} still live",
            diagnostics.allocated, diagnostics.released, device.live
        );
        print!("{}", diagnostics.render_waterfall(&graph));
    }

    for command in &device.commands {
        println!("{command}");
    }

    let released = graph.teardown(&mut device);
    println!("teardown released {released}, {} still live", device.live);

    Ok(())
}
