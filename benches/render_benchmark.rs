use criterion::{black_box, criterion_group, criterion_main, Criterion};
use storyreel::animation::{compute_transform, AnimationType};
use storyreel::captions::CaptionTrack;
use storyreel::eval::evaluate_scene;
use storyreel::graph::{Asset, AssetKind, SceneGraphBuilder};
use storyreel::project::SceneRecord;
use storyreel::renderer::Timeline;

const NARRATION: &str = "The deep ocean covers most of our planet, yet we have mapped less of it \
than the surface of Mars. Pressure, darkness and cold make every dive an expedition.";

fn bench_compute_transform(c: &mut Criterion) {
    let assets: Vec<Asset> = AnimationType::ALL
        .iter()
        .map(|&kind| Asset {
            animation_type: kind,
            animation_duration: 1.5,
            animation_delay: 0.25,
            ..Asset::new(kind.as_str(), AssetKind::Image, "bg.png")
        })
        .collect();

    c.bench_function("compute_transform_all_types", |b| {
        b.iter(|| {
            for asset in &assets {
                black_box(compute_transform(asset, black_box(0.8), 10.0));
            }
        })
    });
}

fn bench_active_word(c: &mut Criterion) {
    let track = CaptionTrack::from_plain_text(&NARRATION.repeat(20), 600.0);

    c.bench_function("active_word_lookup", |b| {
        let mut t = 0.0;
        b.iter(|| {
            t = (t + 1.0 / 60.0) % 600.0;
            black_box(track.active_word(black_box(t)))
        })
    });
}

fn bench_evaluate_frame(c: &mut Criterion) {
    let mut record = SceneRecord::new("s1", NARRATION, 12.0);
    record.media_url = Some("images/ocean.png".into());
    let graph = SceneGraphBuilder::new("http://localhost:3001").build(&[record.clone(), record]);
    let timeline = Timeline::layout(&graph.scenes, graph.fps);
    let tracks: Vec<_> = graph
        .scenes
        .iter()
        .map(|s| CaptionTrack::from_plain_text(&s.text, s.duration))
        .collect();

    c.bench_function("evaluate_frame", |b| {
        let mut frame = 0;
        b.iter(|| {
            frame = (frame + 1) % timeline.total_frames();
            if let Some((idx, local)) = timeline.local_time(black_box(frame)) {
                black_box(evaluate_scene(&graph.scenes[idx], &tracks[idx], local));
            }
        })
    });
}

criterion_group!(benches, bench_compute_transform, bench_active_word, bench_evaluate_frame);
criterion_main!(benches);
