use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal::Decimal;

fn build_stage(n_industries: usize) -> sim_core::Stage {
    let commodities = vec![
        sim_core::Commodity {
            id: 1,
            name: "Money".into(),
            origin: "MONEY".into(),
            ..Default::default()
        },
        sim_core::Commodity {
            id: 2,
            name: "Means of Production".into(),
            origin: "INDUSTRIAL".into(),
            ..Default::default()
        },
        sim_core::Commodity {
            id: 3,
            name: "Labour Power".into(),
            origin: "SOCIAL".into(),
            ..Default::default()
        },
    ];
    let mut industries = Vec::with_capacity(n_industries);
    let mut industry_stocks = Vec::with_capacity(n_industries * 4);
    let mut next_id = 0;
    for i in 0..n_industries {
        let industry_id = i as i64 + 1;
        industries.push(sim_core::Industry {
            id: industry_id,
            name: format!("I{i}"),
            output_scale: Decimal::new(2000, 0),
            ..Default::default()
        });
        for (usage, origin, commodity_id) in [
            ("Money", "MONEY", 1),
            ("Sales", "INDUSTRIAL", 2),
            ("Production", "SOCIAL", 3),
            ("Production", "INDUSTRIAL", 2),
        ] {
            next_id += 1;
            industry_stocks.push(sim_core::IndustryStock {
                id: next_id,
                industry_id,
                commodity_id,
                usage_type: usage.into(),
                origin: origin.into(),
                size: Decimal::new(100, 0),
                ..Default::default()
            });
        }
    }
    sim_core::Stage {
        commodities,
        industries,
        industry_stocks,
        ..Default::default()
    }
}

fn bench_link(c: &mut Criterion) {
    let stage = build_stage(200);
    c.bench_function("link 200 industries", |b| {
        b.iter(|| {
            let linked = sim_link::link(black_box(stage.clone()));
            black_box(linked.report().is_clean())
        })
    });
}

criterion_group!(benches, bench_link);
criterion_main!(benches);
